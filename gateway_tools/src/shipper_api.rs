use log::*;
use reqwest::Method;

use crate::{
    config::ShipperConfig,
    data_objects::{NewShipment, RawBooking, RawCancellation, ShipmentBooking},
    rest::RestClient,
    ShipperError,
};

/// Client for the shipping provider's booking API.
#[derive(Clone)]
pub struct ShipperApi {
    client: RestClient,
}

impl ShipperApi {
    pub fn new(config: ShipperConfig) -> Result<Self, ShipperError> {
        let client =
            RestClient::new(&config.base_url, &config.api_key, config.timeout).map_err(ShipperError::Initialization)?;
        Ok(Self { client })
    }

    pub async fn create_shipment(&self, shipment: NewShipment) -> Result<ShipmentBooking, ShipperError> {
        debug!("Booking {} for {}", shipment.courier_company, shipment.reference_id);
        let raw = self.client.query::<RawBooking, NewShipment>(Method::POST, "/v1/orders", Some(shipment)).await?;
        let booking = ShipmentBooking::try_from(raw)?;
        info!("Shipment {} booked with {}", booking.id, booking.courier);
        Ok(booking)
    }

    pub async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), ShipperError> {
        let path = format!("/v1/orders/{shipment_id}");
        debug!("Cancelling shipment {shipment_id}");
        let raw = self.client.query::<RawCancellation, ()>(Method::DELETE, &path, None).await?;
        if raw.success == Some(false) {
            let message = raw.message.unwrap_or_default();
            warn!("Shipment {shipment_id} could not be cancelled. {message}");
            return Err(ShipperError::Refused(message));
        }
        info!("Shipment {shipment_id} cancelled");
        Ok(())
    }
}
