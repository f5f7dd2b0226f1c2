//! Seams to the engine's external collaborators: the payment gateway and the shipping provider.
//!
//! Implementations live outside the engine (see the `gateway_tools` crate). Everything they return is treated as
//! untrusted input, and every call made through these traits is wrapped in a timeout by the caller.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Address, ConversionError, Money, PaymentMethod},
    traits::GatewayError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub merchant_ref: String,
    pub invoice_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub gateway_ref: String,
    pub redirect_url: Option<String>,
    pub status: GatewayPaymentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

/// A gateway's statement about one payment attempt, from a push notification or an inquiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub merchant_ref: String,
    pub gateway_ref: Option<String>,
    pub status: GatewayPaymentStatus,
    pub amount: Option<Money>,
    pub method: Option<PaymentMethod>,
}

#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Registers a new charge with the gateway. The charge is pending until the gateway says otherwise.
    async fn submit(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError>;

    /// Asks the gateway for the current state of the charge with the given merchant reference.
    async fn inquire(&self, merchant_ref: &str) -> Result<GatewayNotification, GatewayError>;

    /// Parses the raw body of a push notification. The signature has already been checked by the engine.
    fn parse_notification(&self, body: &[u8]) -> Result<GatewayNotification, GatewayError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_number: String,
    pub courier: String,
    pub recipient: Address,
    pub weight_grams: i64,
    pub declared_value: Money,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub shipment_id: String,
    pub courier: String,
    pub tracking_number: Option<String>,
}

/// The shipping provider's fixed status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    PickedUp,
    InTransit,
    Delivered,
    Returned,
}

impl Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShipmentStatus::PickedUp => write!(f, "picked_up"),
            ShipmentStatus::InTransit => write!(f, "in_transit"),
            ShipmentStatus::Delivered => write!(f, "delivered"),
            ShipmentStatus::Returned => write!(f, "returned"),
        }
    }
}

impl FromStr for ShipmentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "picked_up" | "picked" | "pickup" => Ok(Self::PickedUp),
            "in_transit" | "dropping_off" | "on_hold" => Ok(Self::InTransit),
            "delivered" => Ok(Self::Delivered),
            "returned" | "return_in_transit" | "rejected" => Ok(Self::Returned),
            s => Err(ConversionError { kind: "shipment status", value: s.to_string() }),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait ShippingProvider {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<ShipmentCreated, GatewayError>;

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<(), GatewayError>;
}

/// A shipping provider for stores that hand parcels to couriers themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualShipping;

impl ShippingProvider for ManualShipping {
    async fn create_shipment(&self, _request: ShipmentRequest) -> Result<ShipmentCreated, GatewayError> {
        Err(GatewayError::NotConfigured("shipping provider".into()))
    }

    async fn cancel_shipment(&self, _shipment_id: &str) -> Result<(), GatewayError> {
        Ok(())
    }
}
