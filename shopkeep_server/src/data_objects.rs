use std::fmt::Display;

use serde::{Deserialize, Serialize};
use shopkeep_engine::{
    db_types::{Money, NewOrder, PaymentMethod},
    traits::{ArrivalDetails, SettlementOutcome},
};

/// Used in admin requests that do not name who is acting.
pub const DEFAULT_ACTOR: &str = "admin";

fn default_actor() -> String {
    DEFAULT_ACTOR.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosRequest {
    pub order: NewOrder,
    pub cashier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayParams {
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletPayParams {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupParams {
    pub user_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArriveParams {
    #[serde(flatten)]
    pub details: ArrivalDetails,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookShipmentParams {
    pub courier: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipParams {
    pub courier: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelParams {
    pub reason: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorParams {
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundParams {
    pub amount: Money,
    pub reason: String,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentParams {
    pub method: PaymentMethod,
    #[serde(default = "default_actor")]
    pub actor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteParams {
    pub note: String,
    #[serde(default)]
    pub customer_visible: bool,
    #[serde(default = "default_actor")]
    pub actor: String,
}

/// Query string the gateway appends when it sends the customer back to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnParams {
    pub order_id: String,
}

/// What a payment signal did, in a shape the storefront can show.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub invoice_number: String,
    pub invoice_status: String,
    pub outcome: SettlementOutcome,
}

impl From<SettlementOutcome> for PaymentResult {
    fn from(outcome: SettlementOutcome) -> Self {
        let invoice = outcome.invoice();
        Self {
            invoice_number: invoice.invoice_number.to_string(),
            invoice_status: invoice.status.to_string(),
            outcome,
        }
    }
}
