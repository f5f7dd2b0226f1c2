//! Wire objects for the payment gateway and the shipping provider.
//!
//! Responses are deserialized into `Raw*` structs in which every field is optional, and then checked field by field
//! before being turned into the types the rest of the system sees. A response that is missing something we rely on is
//! an error, never a default.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopkeep_common::Money;

use crate::{helpers::parse_gateway_amount, PayGateError, ShipperError};

//--------------------------------------     Payment gateway     ------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct NewCharge {
    /// Our reference for this attempt. The gateway calls it the order id.
    #[serde(rename = "order_id")]
    pub merchant_ref: String,
    pub gross_amount: String,
    pub payment_type: String,
    pub item_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_details: Option<CustomerDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomerDetails {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The state of a charge as the gateway reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Pending,
    Settled,
    Failed,
    Expired,
}

impl FromStr for ChargeState {
    type Err = PayGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "authorize" => Ok(Self::Pending),
            "settlement" | "capture" => Ok(Self::Settled),
            "deny" | "cancel" | "failure" => Ok(Self::Failed),
            "expire" => Ok(Self::Expired),
            other => Err(PayGateError::UnknownStatus(other.to_string())),
        }
    }
}

impl Display for ChargeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChargeState::Pending => write!(f, "pending"),
            ChargeState::Settled => write!(f, "settled"),
            ChargeState::Failed => write!(f, "failed"),
            ChargeState::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    pub status_code: Option<String>,
    pub status_message: Option<String>,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub gross_amount: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_status: Option<String>,
    pub redirect_url: Option<String>,
}

/// A checked statement from the gateway about one charge. Charge responses, status inquiries and push notifications
/// all arrive in this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionStatus {
    pub merchant_ref: String,
    pub transaction_id: String,
    pub state: ChargeState,
    pub gross_amount: Option<Money>,
    pub payment_type: Option<String>,
    pub redirect_url: Option<String>,
}

impl TransactionStatus {
    /// Parses the raw body of a push notification.
    pub fn from_notification(body: &[u8]) -> Result<Self, PayGateError> {
        let raw: RawTransaction = serde_json::from_slice(body).map_err(|e| PayGateError::JsonError(e.to_string()))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawTransaction> for TransactionStatus {
    type Error = PayGateError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        // the gateway answers errors with a 2xx and a 4xx/5xx status code in the body
        if let Some(code) = raw.status_code.as_deref().and_then(|c| c.parse::<u16>().ok()).filter(|c| *c >= 400) {
            let message = raw.status_message.unwrap_or_default();
            return Err(PayGateError::QueryError { status: code, message });
        }
        let merchant_ref = raw.order_id.filter(|s| !s.is_empty()).ok_or(PayGateError::MissingField("order_id"))?;
        let transaction_id =
            raw.transaction_id.filter(|s| !s.is_empty()).ok_or(PayGateError::MissingField("transaction_id"))?;
        let state = raw.transaction_status.ok_or(PayGateError::MissingField("transaction_status"))?.parse()?;
        let gross_amount = raw.gross_amount.as_deref().map(parse_gateway_amount).transpose()?;
        Ok(Self {
            merchant_ref,
            transaction_id,
            state,
            gross_amount,
            payment_type: raw.payment_type,
            redirect_url: raw.redirect_url,
        })
    }
}

//--------------------------------------    Shipping provider    ------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct NewShipment {
    pub reference_id: String,
    pub courier_company: String,
    pub destination_contact_name: String,
    pub destination_contact_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_contact_email: Option<String>,
    pub destination_address: String,
    pub destination_city: String,
    pub destination_postal_code: String,
    /// grams
    pub weight: i64,
    pub declared_value: i64,
    pub items: Vec<ShipmentLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentLine {
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCourier {
    pub company: Option<String>,
    pub waybill_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBooking {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub id: Option<String>,
    pub status: Option<String>,
    pub courier: Option<RawCourier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentBooking {
    pub id: String,
    pub status: String,
    pub courier: String,
    pub waybill_id: Option<String>,
}

impl TryFrom<RawBooking> for ShipmentBooking {
    type Error = ShipperError;

    fn try_from(raw: RawBooking) -> Result<Self, Self::Error> {
        if raw.success == Some(false) {
            return Err(ShipperError::Refused(raw.message.unwrap_or_default()));
        }
        let id = raw.id.filter(|s| !s.is_empty()).ok_or(ShipperError::MissingField("id"))?;
        let courier = raw.courier.unwrap_or_default();
        let company = courier.company.ok_or(ShipperError::MissingField("courier.company"))?;
        Ok(Self {
            id,
            status: raw.status.unwrap_or_else(|| "confirmed".to_string()),
            courier: company,
            waybill_id: courier.waybill_id.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCancellation {
    pub success: Option<bool>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawWebhook {
    order_id: Option<String>,
    status: Option<String>,
    courier_waybill_id: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

/// A status update pushed by the shipping provider. `status` is the provider's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentWebhook {
    pub shipment_id: String,
    pub status: String,
    pub waybill_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ShipmentWebhook {
    pub fn from_body(body: &[u8]) -> Result<Self, ShipperError> {
        let raw: RawWebhook = serde_json::from_slice(body).map_err(|e| ShipperError::JsonError(e.to_string()))?;
        let shipment_id = raw.order_id.filter(|s| !s.is_empty()).ok_or(ShipperError::MissingField("order_id"))?;
        let status = raw.status.filter(|s| !s.is_empty()).ok_or(ShipperError::MissingField("status"))?;
        Ok(Self { shipment_id, status, waybill_id: raw.courier_waybill_id, updated_at: raw.updated_at })
    }
}
