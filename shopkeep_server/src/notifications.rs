//! Default receivers for engine events.
//!
//! The server does not send email or chat messages itself. Each event is written to the log under the
//! `shopkeep::notifications` target together with its idempotency key, so that an external mailer tailing the log can
//! skip repeats.
use std::{future::Future, pin::Pin};

use log::*;
use shopkeep_engine::events::{EventHooks, EventType, IdempotentEvent, ReminderKind};

const TARGET: &str = "shopkeep::notifications";

pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| notify(EventType::OrderPaid(ev)))
        .on_payment_late(|ev| notify(EventType::PaymentLate(ev)))
        .on_wallet_credited(|ev| notify(EventType::WalletCredited(ev)))
        .on_order_cancelled(|ev| notify(EventType::OrderCancelled(ev)))
        .on_order_shipped(|ev| notify(EventType::OrderShipped(ev)))
        .on_order_arrived(|ev| notify(EventType::OrderArrived(ev)))
        .on_invoice_reminder(|ev| notify(EventType::InvoiceReminder(ev)))
        .on_deposit_forfeited(|ev| notify(EventType::DepositForfeited(ev)));
    hooks
}

fn notify(event: EventType) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let key = event.idempotency_key();
        info!(target: TARGET, "📬️ [{key}] {}", describe(&event));
    })
}

pub fn describe(event: &EventType) -> String {
    match event {
        EventType::OrderPaid(e) => format!(
            "Order {} is paid. Invoice {} settled for {}",
            e.order.order_number, e.invoice.invoice_number, e.invoice.amount
        ),
        EventType::PaymentLate(e) => format!(
            "Payment for invoice {} arrived after it closed. The money went to the wallet of {}",
            e.invoice.invoice_number, e.wallet_owner
        ),
        EventType::WalletCredited(e) => {
            format!("Wallet of {} was topped up with {}", e.user_id, e.invoice.amount)
        },
        EventType::OrderCancelled(e) => format!(
            "Order {} was cancelled. Refunded {}, forfeited {}",
            e.order.order_number, e.refunded, e.forfeited
        ),
        EventType::OrderShipped(e) => format!("Order {} is on its way", e.order.order_number),
        EventType::OrderArrived(e) => match &e.balance_invoice {
            Some(inv) => format!(
                "The goods for order {} have arrived. Balance invoice {} for {} is now payable",
                e.order.order_number, inv.invoice_number, inv.amount
            ),
            None => format!("The goods for order {} have arrived", e.order.order_number),
        },
        EventType::InvoiceReminder(e) => match e.kind {
            ReminderKind::ExpiringSoon => format!("Invoice {} expires soon", e.invoice.invoice_number),
            ReminderKind::BalanceDue { days } => {
                format!("Balance invoice {} is due in {days} day(s)", e.invoice.invoice_number)
            },
        },
        EventType::DepositForfeited(e) => format!(
            "Balance for order {} was not paid in time. A deposit of {} was forfeited",
            e.order.order_number, e.forfeited
        ),
    }
}
