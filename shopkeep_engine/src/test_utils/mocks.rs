//! In-memory stand-ins for the payment gateway and the shipping provider.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use crate::{
    db_types::Money,
    traits::{
        ChargeRequest,
        ChargeResponse,
        GatewayError,
        GatewayNotification,
        GatewayPaymentStatus,
        PaymentGateway,
        ShipmentCreated,
        ShipmentRequest,
        ShippingProvider,
    },
};

#[derive(Default)]
struct GatewayState {
    charges: Mutex<Vec<ChargeRequest>>,
    statuses: Mutex<HashMap<String, GatewayNotification>>,
    offline: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

/// A payment gateway that accepts every charge and reports whatever status the test tells it to.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<GatewayState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every charge submitted so far.
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.state.charges.lock().expect("lock poisoned").clone()
    }

    /// Sets what an inquiry for `merchant_ref` returns. The amount defaults to the amount that was charged.
    pub fn set_status(&self, merchant_ref: &str, status: GatewayPaymentStatus, amount: Option<Money>) {
        let charged = self.charges().into_iter().find(|c| c.merchant_ref == merchant_ref);
        let notification = GatewayNotification {
            merchant_ref: merchant_ref.to_string(),
            gateway_ref: Some(format!("GW-{merchant_ref}")),
            status,
            amount: amount.or_else(|| charged.as_ref().map(|c| c.amount)),
            method: charged.map(|c| c.method),
        };
        self.state.statuses.lock().expect("lock poisoned").insert(merchant_ref.to_string(), notification);
    }

    /// The gateway's view of `merchant_ref`, if it knows about it.
    pub fn notification(&self, merchant_ref: &str) -> Option<GatewayNotification> {
        self.state.statuses.lock().expect("lock poisoned").get(merchant_ref).cloned()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes every call take at least `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.state.delay.lock().expect("lock poisoned") = delay;
    }

    async fn simulate_network(&self) -> Result<(), GatewayError> {
        let delay = *self.state.delay.lock().expect("lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("mock gateway".into()));
        }
        Ok(())
    }
}

impl PaymentGateway for MockGateway {
    async fn submit(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        self.simulate_network().await?;
        let merchant_ref = request.merchant_ref.clone();
        self.state.charges.lock().expect("lock poisoned").push(request);
        self.set_status(&merchant_ref, GatewayPaymentStatus::Pending, None);
        Ok(ChargeResponse {
            gateway_ref: format!("GW-{merchant_ref}"),
            redirect_url: Some(format!("https://pay.example.com/{merchant_ref}")),
            status: GatewayPaymentStatus::Pending,
        })
    }

    async fn inquire(&self, merchant_ref: &str) -> Result<GatewayNotification, GatewayError> {
        self.simulate_network().await?;
        self.notification(merchant_ref)
            .ok_or_else(|| GatewayError::Rejected(format!("Unknown transaction {merchant_ref}")))
    }

    fn parse_notification(&self, body: &[u8]) -> Result<GatewayNotification, GatewayError> {
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }
}

#[derive(Default)]
struct ShipperState {
    booked: Mutex<Vec<ShipmentRequest>>,
    cancelled: Mutex<Vec<String>>,
    counter: AtomicU64,
    offline: AtomicBool,
}

/// A shipping provider that books everything and remembers what it was asked to do.
#[derive(Clone, Default)]
pub struct MockShipper {
    state: Arc<ShipperState>,
}

impl MockShipper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn booked(&self) -> Vec<ShipmentRequest> {
        self.state.booked.lock().expect("lock poisoned").clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.cancelled.lock().expect("lock poisoned").clone()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.offline.store(offline, Ordering::SeqCst);
    }
}

impl ShippingProvider for MockShipper {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ShipmentCreated, GatewayError> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("mock shipper".into()));
        }
        let n = self.state.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let courier = request.courier.clone();
        self.state.booked.lock().expect("lock poisoned").push(request);
        Ok(ShipmentCreated { shipment_id: format!("SHP-{n:04}"), courier, tracking_number: Some(format!("TRK{n:08}")) })
    }

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), GatewayError> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable("mock shipper".into()));
        }
        self.state.cancelled.lock().expect("lock poisoned").push(shipment_id.to_string());
        Ok(())
    }
}
