use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, Money, Order, WalletTransaction};

/// Receivers may see the same event more than once. The key is stable for a given occurrence, so they can skip
/// repeats.
pub trait IdempotentEvent {
    fn idempotency_key(&self) -> String;
}

/// An invoice was paid on time and the order moved on.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub invoice: Invoice,
}

impl OrderPaidEvent {
    pub fn new(order: Order, invoice: Invoice) -> Self {
        Self { order, invoice }
    }
}

impl IdempotentEvent for OrderPaidEvent {
    fn idempotency_key(&self) -> String {
        format!("order_paid:{}", self.invoice.invoice_number)
    }
}

/// A payment settled after its invoice had closed. The money was credited to `wallet_owner`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentLateEvent {
    pub invoice: Invoice,
    pub wallet_owner: String,
    pub wallet_tx: Option<WalletTransaction>,
}

impl IdempotentEvent for PaymentLateEvent {
    fn idempotency_key(&self) -> String {
        format!("payment_late:{}", self.invoice.invoice_number)
    }
}

/// A top-up settled and the wallet was credited.
#[derive(Debug, Clone, Serialize)]
pub struct WalletCreditedEvent {
    pub user_id: String,
    pub invoice: Invoice,
    pub wallet_tx: Option<WalletTransaction>,
}

impl IdempotentEvent for WalletCreditedEvent {
    fn idempotency_key(&self) -> String {
        format!("wallet_credited:{}", self.invoice.invoice_number)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
    pub refunded: Money,
    pub forfeited: Money,
}

impl OrderCancelledEvent {
    pub fn new(order: Order, refunded: Money, forfeited: Money) -> Self {
        Self { order, refunded, forfeited }
    }
}

impl IdempotentEvent for OrderCancelledEvent {
    fn idempotency_key(&self) -> String {
        format!("order_cancelled:{}", self.order.order_number)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderShippedEvent {
    pub order: Order,
}

impl IdempotentEvent for OrderShippedEvent {
    fn idempotency_key(&self) -> String {
        format!("order_shipped:{}", self.order.order_number)
    }
}

/// Pre-ordered goods arrived; the balance (if any) is now payable.
#[derive(Debug, Clone, Serialize)]
pub struct OrderArrivedEvent {
    pub order: Order,
    pub balance_invoice: Option<Invoice>,
}

impl IdempotentEvent for OrderArrivedEvent {
    fn idempotency_key(&self) -> String {
        format!("order_arrived:{}", self.order.order_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// The payment window of an unpaid invoice is about to close.
    ExpiringSoon,
    /// A balance invoice is due in the given number of days.
    BalanceDue { days: i64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceReminderEvent {
    pub invoice: Invoice,
    pub kind: ReminderKind,
}

impl IdempotentEvent for InvoiceReminderEvent {
    fn idempotency_key(&self) -> String {
        match self.kind {
            ReminderKind::ExpiringSoon => format!("reminder:{}:expiring", self.invoice.invoice_number),
            ReminderKind::BalanceDue { days } => format!("reminder:{}:due_in_{days}", self.invoice.invoice_number),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositForfeitedEvent {
    pub order: Order,
    pub invoice: Invoice,
    pub forfeited: Money,
}

impl IdempotentEvent for DepositForfeitedEvent {
    fn idempotency_key(&self) -> String {
        format!("deposit_forfeited:{}", self.order.order_number)
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    PaymentLate(PaymentLateEvent),
    WalletCredited(WalletCreditedEvent),
    OrderCancelled(OrderCancelledEvent),
    OrderShipped(OrderShippedEvent),
    OrderArrived(OrderArrivedEvent),
    InvoiceReminder(InvoiceReminderEvent),
    DepositForfeited(DepositForfeitedEvent),
}

impl IdempotentEvent for EventType {
    fn idempotency_key(&self) -> String {
        match self {
            EventType::OrderPaid(e) => e.idempotency_key(),
            EventType::PaymentLate(e) => e.idempotency_key(),
            EventType::WalletCredited(e) => e.idempotency_key(),
            EventType::OrderCancelled(e) => e.idempotency_key(),
            EventType::OrderShipped(e) => e.idempotency_key(),
            EventType::OrderArrived(e) => e.idempotency_key(),
            EventType::InvoiceReminder(e) => e.idempotency_key(),
            EventType::DepositForfeited(e) => e.idempotency_key(),
        }
    }
}
