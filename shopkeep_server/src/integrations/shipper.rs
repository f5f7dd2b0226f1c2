use gateway_tools::{NewShipment, ShipmentLine, ShipperApi, ShipperError};
use shopkeep_engine::{
    traits::{ManualShipping, ShipmentCreated, ShipmentRequest},
    GatewayError,
    ShippingProvider,
};

/// The shipping provider's booking API, as the engine sees it.
#[derive(Clone)]
pub struct ShipperProvider {
    api: ShipperApi,
}

impl ShipperProvider {
    pub fn new(api: ShipperApi) -> Self {
        Self { api }
    }
}

impl ShippingProvider for ShipperProvider {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ShipmentCreated, GatewayError> {
        let booking = self.api.create_shipment(new_shipment(request)).await.map_err(shipper_error)?;
        Ok(ShipmentCreated { shipment_id: booking.id, courier: booking.courier, tracking_number: booking.waybill_id })
    }

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), GatewayError> {
        self.api.cancel_shipment(shipment_id).await.map_err(shipper_error)
    }
}

/// Either the provider's API, or nothing at all when the store books its parcels by hand.
#[derive(Clone)]
pub enum ShippingBackend {
    Provider(ShipperProvider),
    Manual(ManualShipping),
}

impl ShippingProvider for ShippingBackend {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ShipmentCreated, GatewayError> {
        match self {
            ShippingBackend::Provider(p) => p.create_shipment(request).await,
            ShippingBackend::Manual(m) => m.create_shipment(request).await,
        }
    }

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), GatewayError> {
        match self {
            ShippingBackend::Provider(p) => p.cancel_shipment(shipment_id).await,
            ShippingBackend::Manual(m) => m.cancel_shipment(shipment_id).await,
        }
    }
}

fn new_shipment(request: ShipmentRequest) -> NewShipment {
    let recipient = request.recipient;
    let destination_address = match recipient.line2 {
        Some(line2) if !line2.is_empty() => format!("{}, {line2}", recipient.line1),
        _ => recipient.line1,
    };
    NewShipment {
        reference_id: request.order_number,
        courier_company: request.courier,
        destination_contact_name: recipient.name,
        destination_contact_phone: recipient.phone.unwrap_or_default(),
        destination_contact_email: recipient.email,
        destination_address,
        destination_city: recipient.city,
        destination_postal_code: recipient.postal_code,
        weight: request.weight_grams,
        declared_value: request.declared_value.value(),
        items: request.items.into_iter().map(|i| ShipmentLine { name: i.name, quantity: i.quantity }).collect(),
    }
}

fn shipper_error(e: ShipperError) -> GatewayError {
    match e {
        ShipperError::Timeout => GatewayError::Timeout("shipping provider".into()),
        ShipperError::Unreachable(s) => GatewayError::Unreachable(format!("shipping provider. {s}")),
        ShipperError::QueryError { status, message } => GatewayError::UnexpectedStatus { status, message },
        ShipperError::Initialization(s) => GatewayError::NotConfigured(format!("shipping provider. {s}")),
        ShipperError::JsonError(s) => GatewayError::MalformedResponse(s),
        ShipperError::MissingField(field) => GatewayError::MalformedResponse(format!("missing field '{field}'")),
        ShipperError::Refused(s) => GatewayError::Rejected(s),
    }
}
