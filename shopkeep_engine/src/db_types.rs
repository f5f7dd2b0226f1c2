//! Record types shared by the engine's backends and public APIs.
//!
//! Everything that is persisted lives here. Enumerations are stored as lower `snake_case` text, and monetary values
//! are whole minor units wrapped in [`Money`].
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

pub use shopkeep_common::Money;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind} value: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `Display` and `FromStr` for a plain enum, using the same spelling as the database column.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    s => Err(ConversionError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

//--------------------------------------     OrderNumber      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for OrderNumber {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------    InvoiceNumber     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct InvoiceNumber(pub String);

impl InvoiceNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for InvoiceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for InvoiceNumber {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------   OrderStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Created, nothing paid yet.
    Pending,
    /// Deposit received, waiting for the goods to arrive.
    PreOrder,
    /// Goods arrived; the balance invoice is open.
    PaymentDue,
    /// Fully paid, waiting to be shipped.
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

text_enum!(OrderStatusType, "order status", {
    Pending => "pending",
    PreOrder => "pre_order",
    PaymentDue => "payment_due",
    Processing => "processing",
    Shipped => "shipped",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl OrderStatusType {
    /// Statuses from which an order may still be cancelled.
    pub const CANCELLABLE: [OrderStatusType; 4] = [Self::Pending, Self::PreOrder, Self::PaymentDue, Self::Processing];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn is_cancellable(&self) -> bool {
        Self::CANCELLABLE.contains(self)
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    DepositPaid,
    Paid,
    Refunded,
    RefundedPartial,
}

text_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    DepositPaid => "deposit_paid",
    Paid => "paid",
    Refunded => "refunded",
    RefundedPartial => "refunded_partial",
});

//--------------------------------------      StockState      ---------------------------------------------------------
/// Tracks what has happened to the inventory held for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StockState {
    /// `reserved_qty` is held on each product.
    Reserved,
    /// The reservation has been converted into a permanent stock deduction.
    Committed,
    /// Nothing is held any more.
    Released,
}

text_enum!(StockState, "stock state", {
    Reserved => "reserved",
    Committed => "committed",
    Released => "released",
});

//--------------------------------------     SalesChannel     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
    Online,
    Pos,
}

text_enum!(SalesChannel, "sales channel", {
    Online => "online",
    Pos => "pos",
});

//--------------------------------------     InvoiceType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Full,
    Deposit,
    Balance,
    Topup,
}

text_enum!(InvoiceType, "invoice type", {
    Full => "full",
    Deposit => "deposit",
    Balance => "balance",
    Topup => "topup",
});

impl InvoiceType {
    /// Invoice types that expire after the unpaid-invoice TTL. Balance invoices follow their due date instead.
    pub const EXPIRING: [InvoiceType; 3] = [Self::Full, Self::Deposit, Self::Topup];

    /// Whether the money received for this invoice is held as a liability (rather than booked as revenue).
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::Deposit | Self::Topup)
    }
}

//--------------------------------------    InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    /// A dormant pre-order balance invoice. It becomes payable when the goods arrive.
    PendingArrival,
    Paid,
    /// Money arrived after the invoice (or its order) had already been expired or cancelled.
    PaidLate,
    Expired,
    Failed,
    Cancelled,
}

text_enum!(InvoiceStatus, "invoice status", {
    Unpaid => "unpaid",
    PendingArrival => "pending_arrival",
    Paid => "paid",
    PaidLate => "paid_late",
    Expired => "expired",
    Failed => "failed",
    Cancelled => "cancelled",
});

impl InvoiceStatus {
    /// The statuses from which an invoice may be finalized.
    pub const FINALIZABLE: [InvoiceStatus; 4] = [Self::Unpaid, Self::Expired, Self::Failed, Self::Cancelled];

    /// Invoices that are still waiting for money.
    pub const OPEN: [InvoiceStatus; 2] = [Self::Unpaid, Self::PendingArrival];

    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid | Self::PaidLate)
    }

    /// A settlement arriving while the invoice is in one of these states is late.
    pub fn is_late_state(&self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled | Self::Failed)
    }

    pub fn is_finalizable(&self) -> bool {
        Self::FINALIZABLE.contains(self)
    }
}

//--------------------------------------    AttemptStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Success,
    Failed,
}

text_enum!(AttemptStatus, "payment attempt status", {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
});

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
/// The payment method name, as used by the gateway (e.g. `bca_va`, `qris`) or one of the internal methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct PaymentMethod(pub String);

/// Where the money for a payment came from. This decides which ledger account is debited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingSource {
    Bank,
    Cash,
    Wallet,
}

impl PaymentMethod {
    pub const WALLET: &'static str = "wallet";
    pub const CASH: &'static str = "cash";
    pub const MANUAL_TRANSFER: &'static str = "manual_transfer";

    pub fn wallet() -> Self {
        Self(Self::WALLET.to_string())
    }

    pub fn cash() -> Self {
        Self(Self::CASH.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn funding_source(&self) -> FundingSource {
        match self.0.as_str() {
            Self::WALLET => FundingSource::Wallet,
            Self::CASH => FundingSource::Cash,
            _ => FundingSource::Bank,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for PaymentMethod {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------       Address        ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub province: Option<String>,
    pub postal_code: String,
    pub country: String,
}

//--------------------------------------   Pre-order config   ---------------------------------------------------------
/// How large a pre-order deposit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DepositRule {
    /// A percentage of the discounted order subtotal, rounded down.
    Percentage { percent: u32 },
    /// A fixed amount for every unit ordered.
    FixedPerUnit { amount: Money },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreOrderConfig {
    /// Overrides the store-wide deposit percentage.
    #[serde(default)]
    pub deposit: Option<DepositRule>,
    /// Overrides the store-wide number of days a customer has to pay the balance once the goods arrive.
    #[serde(default)]
    pub balance_due_days: Option<i64>,
    #[serde(default)]
    pub estimated_arrival: Option<String>,
}

//--------------------------------------       Product        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price: Money,
    pub cost_price: Money,
    pub weight_grams: i64,
    pub stock: i64,
    pub reserved_qty: i64,
    pub preorder: Option<Json<PreOrderConfig>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn available(&self) -> i64 {
        self.stock - self.reserved_qty
    }

    pub fn is_preorder(&self) -> bool {
        self.preorder.is_some()
    }

    pub fn preorder_config(&self) -> Option<&PreOrderConfig> {
        self.preorder.as_ref().map(|c| &c.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub cost_price: Money,
    #[serde(default)]
    pub weight_grams: i64,
    pub stock: i64,
    #[serde(default)]
    pub preorder: Option<PreOrderConfig>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(sku: S, name: S, price: Money, stock: i64) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            price,
            cost_price: Money::zero(),
            weight_grams: 0,
            stock,
            preorder: None,
        }
    }

    pub fn with_cost_price(mut self, cost: Money) -> Self {
        self.cost_price = cost;
        self
    }

    pub fn with_weight(mut self, grams: i64) -> Self {
        self.weight_grams = grams;
        self
    }

    pub fn as_preorder(mut self, config: PreOrderConfig) -> Self {
        self.preorder = Some(config);
        self
    }
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub user_id: Option<String>,
    pub channel: SalesChannel,
    pub billing_address: Json<Address>,
    pub shipping_address: Json<Address>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount_amount: Money,
    pub discount_code: Option<String>,
    pub total: Money,
    pub deposit_paid: Money,
    pub remaining_balance: Money,
    pub refunded_amount: Money,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
    pub stock_state: StockState,
    pub payment_method: PaymentMethod,
    pub weight_grams: i64,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipment_id: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub revenue_recognized: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The total amount received against this order. Refunds are tracked separately in `refunded_amount`.
    pub fn amount_paid(&self) -> Money {
        self.total - self.remaining_balance
    }

    pub fn is_fully_paid(&self) -> bool {
        self.remaining_balance.is_zero()
    }

    /// The user whose wallet receives credits for this order. Guest orders get a wallet keyed on the order number.
    pub fn wallet_owner(&self) -> String {
        self.user_id.clone().unwrap_or_else(|| format!("guest:{}", self.order_number))
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub cogs_per_unit: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

impl NewOrderItem {
    pub fn new(product_id: i64, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderLog {
    pub id: i64,
    pub order_id: i64,
    pub actor: String,
    pub action: String,
    pub note: Option<String>,
    pub customer_visible: bool,
    pub created_at: DateTime<Utc>,
}

/// An audit log entry that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewOrderLog {
    pub actor: String,
    pub action: String,
    pub note: Option<String>,
    pub customer_visible: bool,
}

impl NewOrderLog {
    pub fn new<A: Into<String>, B: Into<String>>(actor: A, action: B) -> Self {
        Self { actor: actor.into(), action: action.into(), note: None, customer_visible: false }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn visible(mut self) -> Self {
        self.customer_visible = true;
        self
    }
}

/// A checkout request, after it has been parsed at the boundary. Amounts are never taken from the client; only
/// shipping cost is supplied, since rate shopping happens outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Option<String>,
    pub items: Vec<NewOrderItem>,
    pub billing_address: Address,
    pub shipping_address: Address,
    #[serde(default)]
    pub shipping_cost: Money,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new(user_id: Option<String>, items: Vec<NewOrderItem>, payment_method: PaymentMethod) -> Self {
        Self {
            user_id,
            items,
            billing_address: Address::default(),
            shipping_address: Address::default(),
            shipping_cost: Money::zero(),
            discount_code: None,
            payment_method,
            notes: None,
        }
    }

    pub fn with_shipping(mut self, address: Address, cost: Money) -> Self {
        self.billing_address = address.clone();
        self.shipping_address = address;
        self.shipping_cost = cost;
        self
    }

    pub fn with_discount_code<S: Into<String>>(mut self, code: S) -> Self {
        self.discount_code = Some(code.into());
        self
    }
}

//--------------------------------------       Invoice        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: InvoiceNumber,
    pub order_id: Option<i64>,
    pub user_id: Option<String>,
    pub invoice_type: InvoiceType,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub reminder_stage: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// The wallet that receives a late payment or top-up for this invoice.
    pub fn wallet_owner(&self, order: Option<&Order>) -> String {
        match (&self.user_id, order) {
            (Some(user), _) => user.clone(),
            (None, Some(order)) => order.wallet_owner(),
            (None, None) => format!("guest:{}", self.invoice_number),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_id: Option<i64>,
    pub user_id: Option<String>,
    pub invoice_type: InvoiceType,
    pub amount: Money,
    pub status: InvoiceStatus,
    pub due_date: Option<DateTime<Utc>>,
}

//--------------------------------------  PaymentTransaction  ---------------------------------------------------------
/// One attempt at paying an invoice.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub invoice_id: i64,
    pub merchant_ref: String,
    pub gateway_ref: Option<String>,
    pub payment_method: PaymentMethod,
    pub amount: Money,
    pub status: AttemptStatus,
    pub redirect_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       Ledger         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
    Cogs,
}

text_enum!(AccountType, "account type", {
    Asset => "asset",
    Liability => "liability",
    Equity => "equity",
    Revenue => "revenue",
    Expense => "expense",
    Cogs => "cogs",
});

impl AccountType {
    /// Debit-normal accounts grow with debits; the rest grow with credits.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, Self::Asset | Self::Expense | Self::Cogs)
    }

    /// The change in balance caused by a line on an account of this type.
    pub fn balance_change(&self, debit: Money, credit: Money) -> Money {
        if self.is_debit_normal() {
            debit - credit
        } else {
            credit - debit
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Money,
    pub mapping_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JournalEntry {
    pub id: i64,
    pub entry_date: DateTime<Utc>,
    pub description: String,
    pub reference_id: String,
    pub reference_type: String,
    pub reverses_entry: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JournalLine {
    pub id: i64,
    pub entry_id: i64,
    pub account_id: i64,
    pub debit: Money,
    pub credit: Money,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJournalLine {
    pub account_id: i64,
    pub debit: Money,
    pub credit: Money,
    pub memo: Option<String>,
}

impl NewJournalLine {
    pub fn debit(account_id: i64, amount: Money) -> Self {
        Self { account_id, debit: amount, credit: Money::zero(), memo: None }
    }

    pub fn credit(account_id: i64, amount: Money) -> Self {
        Self { account_id, debit: Money::zero(), credit: amount, memo: None }
    }

    pub fn with_memo<S: Into<String>>(mut self, memo: S) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub entry_date: DateTime<Utc>,
    pub description: String,
    pub reference_id: String,
    pub reference_type: String,
    pub reverses_entry: Option<i64>,
    pub lines: Vec<NewJournalLine>,
}

impl NewJournalEntry {
    pub fn new<R: Into<String>, T: Into<String>, D: Into<String>>(
        reference_type: T,
        reference_id: R,
        description: D,
        entry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_date,
            description: description.into(),
            reference_id: reference_id.into(),
            reference_type: reference_type.into(),
            reverses_entry: None,
            lines: Vec::new(),
        }
    }

    pub fn line(mut self, line: NewJournalLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }
}

/// A journal entry together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct PostedEntry {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

//--------------------------------------       Wallets        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Wallet {
    pub user_id: String,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WalletTxType {
    Credit,
    Debit,
}

text_enum!(WalletTxType, "wallet transaction type", {
    Credit => "credit",
    Debit => "debit",
});

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub tx_type: WalletTxType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub reference: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Discount codes    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is a whole percentage.
    Percentage,
    /// `value` is an amount in minor units.
    Fixed,
}

text_enum!(DiscountKind, "discount kind", {
    Percentage => "percentage",
    Fixed => "fixed",
});

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiscountCode {
    pub id: i64,
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub min_order: Money,
    pub max_discount: Option<Money>,
    pub usage_limit: Option<i64>,
    pub used_count: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountCode {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    #[serde(default)]
    pub min_order: Money,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Settings       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_text_round_trips_through_from_str() {
        assert_eq!("pre_order".parse::<OrderStatusType>().unwrap(), OrderStatusType::PreOrder);
        assert_eq!(InvoiceStatus::PendingArrival.to_string(), "pending_arrival");
        assert_eq!("refunded_partial".parse::<PaymentStatus>().unwrap(), PaymentStatus::RefundedPartial);
        let err = "paid_early".parse::<InvoiceStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid invoice status value: paid_early");
    }

    #[test]
    fn late_and_finalizable_states() {
        use InvoiceStatus::*;
        for s in [Expired, Cancelled, Failed] {
            assert!(s.is_late_state());
            assert!(s.is_finalizable());
        }
        assert!(Unpaid.is_finalizable());
        assert!(!Unpaid.is_late_state());
        assert!(!PendingArrival.is_finalizable());
        assert!(!Paid.is_finalizable());
        assert!(PaidLate.is_paid());
    }

    #[test]
    fn account_balance_direction() {
        let hundred = Money::from(100);
        assert_eq!(AccountType::Asset.balance_change(hundred, Money::zero()), hundred);
        assert_eq!(AccountType::Liability.balance_change(hundred, Money::zero()), -hundred);
        assert_eq!(AccountType::Revenue.balance_change(Money::zero(), hundred), hundred);
        assert_eq!(AccountType::Cogs.balance_change(hundred, Money::zero()), hundred);
    }

    #[test]
    fn funding_source_from_method() {
        assert_eq!(PaymentMethod::wallet().funding_source(), FundingSource::Wallet);
        assert_eq!(PaymentMethod::cash().funding_source(), FundingSource::Cash);
        assert_eq!(PaymentMethod::from("bca_va").funding_source(), FundingSource::Bank);
    }

    #[test]
    fn deposit_rule_json_shape() {
        let cfg: PreOrderConfig =
            serde_json::from_str(r#"{"deposit":{"kind":"percentage","percent":50},"balance_due_days":14}"#).unwrap();
        assert_eq!(cfg.deposit, Some(DepositRule::Percentage { percent: 50 }));
        assert_eq!(cfg.balance_due_days, Some(14));
        let json = r#"{"deposit":{"kind":"fixed_per_unit","amount":50000}}"#;
        let cfg: PreOrderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.deposit, Some(DepositRule::FixedPerUnit { amount: Money::from(50_000) }));
    }
}
