//! Invoice finalization. Every path that can mark an invoice as paid ends up in [`finalize_invoice`].
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sqlx::SqliteConnection;

use super::{invoices, ledger, orders, payments, wallets};
use crate::{
    db_types::{Invoice, InvoiceStatus, InvoiceType, NewOrderLog, Order, OrderStatusType, WalletTransaction},
    helpers::new_merchant_ref,
    sqlite::db::lifecycle::commit_order_stock,
    traits::{AccountPurpose, EngineError, SettlementRequest},
};

/// What [`finalize_invoice`] did.
#[derive(Debug, Clone)]
pub enum Finalization {
    /// The invoice was paid by this call.
    Applied { invoice: Invoice, order: Option<Order>, wallet_tx: Option<WalletTransaction>, late: bool },
    /// The invoice was no longer in the status the caller read. Nothing was written.
    Changed,
}

/// Finalizes `invoice`, provided its status is still `prior`.
///
/// The status guard is the first write, so concurrent finalizations of the same invoice serialize on it and exactly
/// one of them applies. Invoices that were expired, failed or cancelled become `paid_late` and their money is moved to
/// the customer's wallet; the order is left alone.
pub async fn finalize_invoice(
    invoice: &Invoice,
    prior: InvoiceStatus,
    request: &SettlementRequest,
    conn: &mut SqliteConnection,
) -> Result<Finalization, EngineError> {
    let late = prior.is_late_state();
    let to = if late { InvoiceStatus::PaidLate } else { InvoiceStatus::Paid };
    let now = request.now;
    let Some(paid) = invoices::finalize_guard(invoice.id, prior, to, &request.method, now, &mut *conn).await? else {
        debug!("🔄️ Invoice {} is no longer {prior}", invoice.invoice_number);
        return Ok(Finalization::Changed);
    };
    let gateway_ref = request.gateway_ref.as_deref();
    match request.attempt_id {
        Some(attempt_id) => {
            if !payments::mark_attempt_success(attempt_id, gateway_ref, now, &mut *conn).await? {
                debug!("🔄️ Attempt {attempt_id} was already marked successful");
            }
        },
        None => {
            let merchant_ref = new_merchant_ref(&paid.invoice_number);
            payments::insert_settled_attempt(paid.id, &merchant_ref, gateway_ref, &request.method, now, &mut *conn)
                .await?;
        },
    }
    ledger::record_payment(&paid, &request.method, gateway_ref, now, &mut *conn).await?;
    let order = match paid.order_id {
        Some(id) => Some(orders::fetch_existing_order(id, &mut *conn).await?),
        None => None,
    };
    if late {
        let wallet_tx = credit_late_payment(&paid, order.as_ref(), &request.actor, now, conn).await?;
        return Ok(Finalization::Applied { invoice: paid, order, wallet_tx, late });
    }
    let (order, wallet_tx) = apply_order_effects(&paid, order, &request.actor, now, conn).await?;
    Ok(Finalization::Applied { invoice: paid, order, wallet_tx, late })
}

async fn credit_late_payment(
    invoice: &Invoice,
    order: Option<&Order>,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, EngineError> {
    if !invoice.amount.is_positive() {
        return Ok(None);
    }
    let number = &invoice.invoice_number;
    ledger::post_transfer(
        "invoice",
        number.as_str(),
        &format!("Late payment on invoice {number} moved to store credit"),
        (AccountPurpose::for_invoice_credit(invoice.invoice_type), AccountPurpose::WalletLiability),
        invoice.amount,
        now,
        &mut *conn,
    )
    .await?;
    let owner = invoice.wallet_owner(order);
    let description = "Payment arrived after cancellation";
    let tx = wallets::credit_wallet(&owner, invoice.amount, number.as_str(), description, now, &mut *conn).await?;
    if let Some(order) = order {
        let amount = invoice.amount;
        let note = format!("Payment of {amount} on invoice {number} arrived late and was credited to the wallet");
        orders::insert_log(order.id, NewOrderLog::new(actor, "late_payment").with_note(note).visible(), now, conn)
            .await?;
    }
    warn!("🔄️ Invoice {number} was paid after it closed. {} credited to wallet {owner}", invoice.amount);
    Ok(Some(tx))
}

async fn apply_order_effects(
    invoice: &Invoice,
    order: Option<Order>,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(Option<Order>, Option<WalletTransaction>), EngineError> {
    let number = &invoice.invoice_number;
    if invoice.invoice_type == InvoiceType::Topup {
        ledger::post_transfer(
            "invoice",
            number.as_str(),
            &format!("Top-up {number} moved to store credit"),
            (AccountPurpose::CustomerDeposit, AccountPurpose::WalletLiability),
            invoice.amount,
            now,
            &mut *conn,
        )
        .await?;
        let owner = invoice.wallet_owner(order.as_ref());
        let tx = wallets::credit_wallet(&owner, invoice.amount, number.as_str(), "Wallet top-up", now, conn).await?;
        info!("🔄️ Top-up {number} settled. {} credited to wallet {owner}", invoice.amount);
        return Ok((order, Some(tx)));
    }
    let Some(order) = order else {
        return Err(EngineError::Validation(format!("{} invoice {number} has no order", invoice.invoice_type)));
    };
    let is_deposit = invoice.invoice_type == InvoiceType::Deposit;
    let updated = orders::apply_payment(order.id, invoice.amount, is_deposit, now, &mut *conn).await?;
    let (from, to, action) = match invoice.invoice_type {
        InvoiceType::Deposit => (OrderStatusType::Pending, OrderStatusType::PreOrder, "deposit_paid"),
        InvoiceType::Balance => (OrderStatusType::PaymentDue, OrderStatusType::Processing, "balance_paid"),
        _ => (OrderStatusType::Pending, OrderStatusType::Processing, "paid"),
    };
    let updated = match orders::transition_status(order.id, &[from], to, now, &mut *conn).await? {
        Some(o) => o,
        None => {
            let order_number = &order.order_number;
            debug!("🔄️ Order {order_number} was {} when {number} was paid. Status left alone.", updated.status);
            updated
        },
    };
    if updated.is_fully_paid() {
        commit_order_stock(&updated, &mut *conn).await?;
    }
    let note = format!("Payment of {} received for invoice {number}", invoice.amount);
    orders::insert_log(order.id, NewOrderLog::new(actor, action).with_note(note).visible(), now, &mut *conn).await?;
    info!("🔄️ Invoice {number} settled. Order {} is now {}", updated.order_number, updated.status);
    let order = orders::fetch_existing_order(order.id, conn).await?;
    Ok((Some(order), None))
}
