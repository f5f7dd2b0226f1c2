use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{
    AccountType,
    FundingSource,
    Invoice,
    InvoiceType,
    Money,
    Order,
    OrderItem,
    PaymentMethod,
    PostedEntry,
    WalletTransaction,
};

/// An order as it comes out of checkout, together with its items and the invoice(s) opened for it.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub invoices: Vec<Invoice>,
}

impl CheckoutResult {
    /// The invoice the customer should pay right now (the full invoice, or the deposit of a pre-order).
    pub fn payable_invoice(&self) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.status == crate::db_types::InvoiceStatus::Unpaid)
    }
}

/// Store-wide pre-order defaults. Products may override both values in their pre-order configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreOrderPolicy {
    pub deposit_percent: u32,
    pub balance_due_days: i64,
}

impl Default for PreOrderPolicy {
    fn default() -> Self {
        Self { deposit_percent: 30, balance_due_days: 7 }
    }
}

/// What the admin tells the engine when pre-ordered goods arrive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalDetails {
    /// A new shipping cost, worked out from the final weight. `None` keeps the amount quoted at checkout.
    #[serde(default)]
    pub shipping_cost: Option<Money>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentDetails {
    pub courier: String,
    /// Falls back to the tracking number of a booked shipment when absent.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentBooking {
    pub shipment_id: String,
    pub courier: String,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipOutcome {
    pub order: Order,
    /// False when the order had already been shipped and nothing changed.
    pub newly_shipped: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOutcome {
    pub order: Order,
    /// Amount returned to the customer as store credit.
    pub refunded: Money,
    pub wallet_tx: Option<WalletTransaction>,
    /// Deposit kept by the store, for cancellations of overdue pre-orders.
    pub forfeited: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub order: Order,
    pub amount: Money,
    pub entry: PostedEntry,
    pub wallet_tx: Option<WalletTransaction>,
}

/// A request to finalize an invoice. Everything that can settle an invoice (gateway push, redirect, inquiry, admin
/// confirmation, point of sale) goes through this.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub invoice_id: i64,
    /// The payment attempt the money arrived through, when known.
    pub attempt_id: Option<i64>,
    pub gateway_ref: Option<String>,
    pub method: PaymentMethod,
    /// The amount the gateway reports. `None` for internal settlements, which always match.
    pub amount: Option<Money>,
    pub actor: String,
    pub now: DateTime<Utc>,
}

impl SettlementRequest {
    pub fn new<S: Into<String>>(invoice_id: i64, method: PaymentMethod, actor: S, now: DateTime<Utc>) -> Self {
        Self { invoice_id, attempt_id: None, gateway_ref: None, method, amount: None, actor: actor.into(), now }
    }

    pub fn with_attempt(mut self, attempt_id: i64) -> Self {
        self.attempt_id = Some(attempt_id);
        self
    }

    pub fn with_gateway_ref<S: Into<String>>(mut self, gateway_ref: S) -> Self {
        self.gateway_ref = Some(gateway_ref.into());
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// The result of pushing a payment signal through reconciliation. None of these are errors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// The invoice was paid on time and the order-side effects were applied.
    Finalized { invoice: Invoice, order: Option<Order> },
    /// The invoice had already been expired or cancelled. The money went to the customer's wallet.
    FinalizedLate { invoice: Invoice, wallet_tx: Option<WalletTransaction> },
    /// Someone else got there first.
    AlreadyProcessed { invoice: Invoice },
    /// The gateway has not settled yet.
    Pending { invoice: Invoice },
    /// The gateway reported the attempt as failed or expired. The invoice stays payable.
    AttemptFailed { invoice: Invoice },
}

impl SettlementOutcome {
    pub fn invoice(&self) -> &Invoice {
        match self {
            SettlementOutcome::Finalized { invoice, .. } |
            SettlementOutcome::FinalizedLate { invoice, .. } |
            SettlementOutcome::AlreadyProcessed { invoice } |
            SettlementOutcome::Pending { invoice } |
            SettlementOutcome::AttemptFailed { invoice } => invoice,
        }
    }

    /// True if this call changed the invoice to a paid state.
    pub fn is_new_settlement(&self) -> bool {
        matches!(self, SettlementOutcome::Finalized { .. } | SettlementOutcome::FinalizedLate { .. })
    }
}

/// Ledger roles. The chart of accounts maps them to concrete accounts through mapping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountPurpose {
    Bank,
    Cash,
    WalletLiability,
    CustomerDeposit,
    SalesRevenue,
    OtherIncome,
    Cogs,
    Inventory,
}

impl AccountPurpose {
    /// Mapping keys tried in order before falling back to the first account of [`Self::fallback_type`].
    pub fn mapping_keys(&self) -> &'static [&'static str] {
        match self {
            AccountPurpose::Bank => &["primary_bank", "bank"],
            AccountPurpose::Cash => &["cash", "petty_cash"],
            AccountPurpose::WalletLiability => &["wallet_liability", "customer_deposit"],
            AccountPurpose::CustomerDeposit => &["customer_deposit"],
            AccountPurpose::SalesRevenue => &["sales_revenue"],
            AccountPurpose::OtherIncome => &["other_income", "forfeited_deposits"],
            AccountPurpose::Cogs => &["cogs"],
            AccountPurpose::Inventory => &["inventory"],
        }
    }

    pub fn fallback_type(&self) -> AccountType {
        match self {
            AccountPurpose::Bank | AccountPurpose::Cash | AccountPurpose::Inventory => AccountType::Asset,
            AccountPurpose::WalletLiability | AccountPurpose::CustomerDeposit => AccountType::Liability,
            AccountPurpose::SalesRevenue | AccountPurpose::OtherIncome => AccountType::Revenue,
            AccountPurpose::Cogs => AccountType::Cogs,
        }
    }

    /// The account that receives the credit when an invoice of this type is paid.
    pub fn for_invoice_credit(invoice_type: InvoiceType) -> Self {
        if invoice_type.is_liability() {
            AccountPurpose::CustomerDeposit
        } else {
            AccountPurpose::SalesRevenue
        }
    }

    /// The account that receives the debit when money arrives through the given funding source.
    pub fn for_funding(source: FundingSource) -> Self {
        match source {
            FundingSource::Bank => AccountPurpose::Bank,
            FundingSource::Cash => AccountPurpose::Cash,
            FundingSource::Wallet => AccountPurpose::WalletLiability,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub total_debit: Money,
    pub total_credit: Money,
    pub accounts: Vec<crate::db_types::Account>,
}

impl TrialBalance {
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// An unpaid invoice that the sweep moved to `expired`, and the cancellation of its order, if one was cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct ExpiredInvoice {
    pub invoice: Invoice,
    pub cancelled: Option<CancelOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForfeitOutcome {
    pub invoice: Invoice,
    pub cancelled: CancelOutcome,
}
