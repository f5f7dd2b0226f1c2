//! Order transitions that touch more than one table: stock, invoices, the ledger and wallets move together with the
//! order row.
//!
//! Every function here opens with a guarded update on the order, so that when it is the first call in a transaction
//! the transaction takes the write lock before it reads anything it relies on.
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use sqlx::SqliteConnection;

use super::{invoices, ledger, orders, products, wallets};
use crate::{
    db_types::{FundingSource, InvoiceStatus, Money, NewOrderLog, Order, OrderStatusType, PaymentMethod, StockState},
    traits::{
        AccountPurpose,
        ArrivalDetails,
        CancelOutcome,
        EngineError,
        RefundOutcome,
        ShipOutcome,
        ShipmentDetails,
    },
};

/// What happens to money already paid against an order that is being cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidAmountPolicy {
    /// Everything paid goes back to the customer as store credit.
    RefundToWallet,
    /// The store keeps the deposit (overdue pre-order balances).
    ForfeitDeposit,
}

/// Turns the order's reservations into permanent deductions. Does nothing if the stock was already committed or
/// released.
pub async fn commit_order_stock(order: &Order, conn: &mut SqliteConnection) -> Result<(), EngineError> {
    if !orders::set_stock_state(order.id, StockState::Reserved, StockState::Committed, &mut *conn).await? {
        debug!("🗃️ Stock for order {} is not reserved. Nothing to commit.", order.order_number);
        return Ok(());
    }
    for item in orders::fetch_order_items(order.id, &mut *conn).await? {
        if !products::commit_reserved_stock(item.product_id, item.quantity, &mut *conn).await? {
            return Err(EngineError::InconsistentStock(
                order.order_number.clone(),
                format!("product {} has fewer than {} units reserved", item.product_id, item.quantity),
            ));
        }
    }
    debug!("🗃️ Stock committed for order {}", order.order_number);
    Ok(())
}

/// Gives back whatever stock the order holds: a reservation is released, a committed deduction is restocked.
pub async fn return_order_stock(order: &Order, conn: &mut SqliteConnection) -> Result<(), EngineError> {
    let items = orders::fetch_order_items(order.id, &mut *conn).await?;
    if orders::set_stock_state(order.id, StockState::Reserved, StockState::Released, &mut *conn).await? {
        for item in &items {
            if !products::release_reserved_stock(item.product_id, item.quantity, &mut *conn).await? {
                return Err(EngineError::InconsistentStock(
                    order.order_number.clone(),
                    format!("product {} has fewer than {} units reserved", item.product_id, item.quantity),
                ));
            }
        }
        debug!("🗃️ Reservation for order {} released", order.order_number);
    } else if orders::set_stock_state(order.id, StockState::Committed, StockState::Released, &mut *conn).await? {
        for item in &items {
            products::restock(item.product_id, item.quantity, &mut *conn).await?;
        }
        debug!("🗃️ Committed stock for order {} put back on the shelf", order.order_number);
    }
    Ok(())
}

/// Splits a refund of `amount` into the part that reverses sales revenue and the part that reverses a deposit still
/// held as a liability. Earlier refunds are taken to have drawn on revenue first.
pub fn refund_split(order: &Order, amount: Money) -> (Money, Money) {
    let unearned_deposit = if order.revenue_recognized { Money::zero() } else { order.deposit_paid };
    let revenue_paid = order.amount_paid().saturating_sub(unearned_deposit);
    let revenue_left = revenue_paid.saturating_sub(order.refunded_amount);
    let from_revenue = amount.min(revenue_left);
    (from_revenue, amount - from_revenue)
}

/// Cancels an order, returns its stock and closes its open invoices. Paid money is handled according to `policy`.
///
/// Returns `None` if the order is not in a cancellable status.
pub async fn cancel_order(
    order_id: i64,
    reason: &str,
    actor: &str,
    policy: PaidAmountPolicy,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CancelOutcome>, EngineError> {
    let Some(order) = orders::mark_cancelled(order_id, reason, now, &mut *conn).await? else {
        return Ok(None);
    };
    return_order_stock(&order, &mut *conn).await?;
    let closed = invoices::cancel_open_invoices(order.id, now, &mut *conn).await?;
    debug!("🗃️ Closed {} open invoice(s) of order {}", closed.len(), order.order_number);
    let held = order.amount_paid() - order.refunded_amount;
    let mut outcome = CancelOutcome { order, refunded: Money::zero(), wallet_tx: None, forfeited: Money::zero() };
    let number = outcome.order.order_number.clone();
    match policy {
        PaidAmountPolicy::RefundToWallet if held.is_positive() => {
            let (from_revenue, from_deposit) = refund_split(&outcome.order, held);
            let description = format!("Order {number} cancelled: {held} returned as store credit");
            ledger::post_by_purpose(
                "order",
                number.as_str(),
                &description,
                &[
                    (AccountPurpose::SalesRevenue, from_revenue, Money::zero()),
                    (AccountPurpose::CustomerDeposit, from_deposit, Money::zero()),
                    (AccountPurpose::WalletLiability, Money::zero(), held),
                ],
                now,
                &mut *conn,
            )
            .await?;
            let owner = outcome.order.wallet_owner();
            let tx = wallets::credit_wallet(&owner, held, number.as_str(), &description, now, &mut *conn).await?;
            outcome.order = orders::mark_fully_refunded(order_id, now, &mut *conn).await?;
            outcome.refunded = held;
            outcome.wallet_tx = Some(tx);
            info!("📦️ Order {number} cancelled. {held} credited to wallet {owner}");
        },
        PaidAmountPolicy::ForfeitDeposit => {
            let (_, deposit) = refund_split(&outcome.order, held);
            ledger::post_transfer(
                "order",
                number.as_str(),
                &format!("Deposit of {deposit} forfeited on order {number}"),
                (AccountPurpose::CustomerDeposit, AccountPurpose::OtherIncome),
                deposit,
                now,
                &mut *conn,
            )
            .await?;
            outcome.forfeited = deposit;
            info!("📦️ Order {number} cancelled. Deposit of {deposit} forfeited");
        },
        PaidAmountPolicy::RefundToWallet => info!("📦️ Order {number} cancelled. Nothing had been paid."),
    }
    let log = NewOrderLog::new(actor, "cancelled").with_note(reason).visible();
    orders::insert_log(order_id, log, now, &mut *conn).await?;
    Ok(Some(outcome))
}

/// Handles the arrival of pre-ordered goods.
///
/// The shipping cost may be re-quoted first. If the deposit covers what is then owed, the order goes straight to
/// `processing` and the dormant balance invoice is cancelled. Otherwise the balance invoice is activated for whatever
/// is left, due on `due_date`.
pub async fn mark_arrived(
    order_id: i64,
    details: ArrivalDetails,
    due_date: DateTime<Utc>,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, EngineError> {
    if details.shipping_cost.is_some_and(|c| c.is_negative()) {
        return Err(EngineError::Validation("Shipping cost cannot be negative".into()));
    }
    let Some(order) = orders::mark_arrived(order_id, details.shipping_cost, now, &mut *conn).await? else {
        let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
        if order.status != OrderStatusType::PreOrder {
            return Err(EngineError::InvalidTransition {
                order: order.order_number,
                from: order.status,
                action: "mark arrived",
            });
        }
        let cost = details.shipping_cost.unwrap_or(order.shipping_cost);
        return Err(EngineError::Validation(format!(
            "Shipping cost {cost} would leave order {} paid beyond its total",
            order.order_number
        )));
    };
    if details.shipping_cost.is_some() {
        debug!("📦️ Shipping for {} quoted at {} on arrival", order.order_number, order.shipping_cost);
    }
    if order.status == OrderStatusType::Processing {
        for dormant in invoices::fetch_invoices_for_order(order.id, &mut *conn).await? {
            if dormant.status == InvoiceStatus::PendingArrival {
                let (from, to) = (InvoiceStatus::PendingArrival, InvoiceStatus::Cancelled);
                invoices::transition_status(dormant.id, from, to, now, &mut *conn).await?;
            }
        }
        let log =
            NewOrderLog::new(actor, "arrived").with_note("Goods arrived. Fully paid, preparing shipment.").visible();
        orders::insert_log(order.id, log, now, &mut *conn).await?;
        info!("📦️ Pre-order {} arrived and is fully paid", order.order_number);
        return Ok(order);
    }
    let balance = invoices::activate_balance_invoice(order.id, order.remaining_balance, due_date, now, &mut *conn)
        .await?
        .ok_or_else(|| EngineError::InvalidTransition {
            order: order.order_number.clone(),
            from: OrderStatusType::PreOrder,
            action: "activate the balance invoice of",
        })?;
    let note = format!("Goods arrived. Balance of {} due by {}", balance.amount, due_date.format("%Y-%m-%d"));
    orders::insert_log(order.id, NewOrderLog::new(actor, "arrived").with_note(note).visible(), now, &mut *conn).await?;
    info!(
        "📦️ Pre-order {} arrived. Balance invoice {} for {} is now payable",
        order.order_number, balance.invoice_number, balance.amount
    );
    Ok(order)
}

/// Ships an order. The first call commits stock if it is still reserved, recognizes any deposit as revenue and books
/// the cost of goods sold. Later calls find the order already shipped and change nothing.
pub async fn ship_order(
    order_id: i64,
    details: ShipmentDetails,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ShipOutcome, EngineError> {
    let tracking = details.tracking_number.as_deref().filter(|t| !t.is_empty());
    let Some(order) = orders::mark_shipped(order_id, &details.courier, tracking, now, &mut *conn).await? else {
        let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
        return match order.status {
            OrderStatusType::Shipped | OrderStatusType::Completed => {
                debug!("🚚️ Order {} has already shipped", order.order_number);
                Ok(ShipOutcome { order, newly_shipped: false })
            },
            from => Err(EngineError::InvalidTransition { order: order.order_number, from, action: "ship" }),
        };
    };
    let number = order.order_number.clone();
    if order.stock_state == StockState::Reserved {
        commit_order_stock(&order, &mut *conn).await?;
    }
    let before_shipping = Order { revenue_recognized: false, ..order.clone() };
    let (_, held_deposit) = refund_split(&before_shipping, order.amount_paid() - order.refunded_amount);
    ledger::post_transfer(
        "order",
        number.as_str(),
        &format!("Deposit on order {number} recognized as revenue on shipment"),
        (AccountPurpose::CustomerDeposit, AccountPurpose::SalesRevenue),
        held_deposit,
        now,
        &mut *conn,
    )
    .await?;
    let items = orders::fetch_order_items(order.id, &mut *conn).await?;
    let cogs: Money = items.iter().map(|i| i.cogs_per_unit * i.quantity).sum();
    ledger::post_transfer(
        "order",
        number.as_str(),
        &format!("Cost of goods shipped on order {number}"),
        (AccountPurpose::Cogs, AccountPurpose::Inventory),
        cogs,
        now,
        &mut *conn,
    )
    .await?;
    let note = match &order.tracking_number {
        Some(t) => format!("Shipped with {} ({t})", details.courier),
        None => format!("Shipped with {}", details.courier),
    };
    orders::insert_log(order.id, NewOrderLog::new(actor, "shipped").with_note(note).visible(), now, &mut *conn).await?;
    let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
    info!("🚚️ Order {number} shipped");
    Ok(ShipOutcome { order, newly_shipped: true })
}

/// `shipped → completed`. Confirming a completed order again is a no-op.
pub async fn confirm_delivery(
    order_id: i64,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, EngineError> {
    match orders::mark_delivered(order_id, now, &mut *conn).await? {
        Some(order) => {
            let log = NewOrderLog::new(actor, "delivered").with_note("Order delivered").visible();
            orders::insert_log(order.id, log, now, &mut *conn).await?;
            info!("🚚️ Order {} delivered", order.order_number);
            Ok(order)
        },
        None => {
            let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
            match order.status {
                OrderStatusType::Completed => Ok(order),
                from => Err(EngineError::InvalidTransition { order: order.order_number, from, action: "complete" }),
            }
        },
    }
}

/// Refunds part or all of what was paid on an order.
///
/// Money goes back the way it came: to the customer's wallet if the order was paid from it, otherwise out of the bank
/// or cash account that received it.
pub async fn refund_order(
    order_id: i64,
    amount: Money,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<RefundOutcome, EngineError> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("Refund amount must be positive, not {amount}")));
    }
    let Some(order) = orders::record_refund(order_id, amount, now, &mut *conn).await? else {
        let order = orders::fetch_existing_order(order_id, &mut *conn).await?;
        let refundable = order.amount_paid() - order.refunded_amount;
        warn!("📦️ Refund of {amount} on {} refused. Only {refundable} is refundable.", order.order_number);
        return Err(EngineError::RefundExceedsPaid { order: order.order_number, requested: amount, refundable });
    };
    let before = Order { refunded_amount: order.refunded_amount - amount, ..order.clone() };
    let (from_revenue, from_deposit) = refund_split(&before, amount);
    let paid_by_wallet = invoices::fetch_invoices_for_order(order.id, &mut *conn)
        .await?
        .iter()
        .filter(|i| i.status.is_paid())
        .any(|i| i.payment_method.as_ref().map(PaymentMethod::funding_source) == Some(FundingSource::Wallet));
    let source = if paid_by_wallet { FundingSource::Wallet } else { order.payment_method.funding_source() };
    let number = order.order_number.clone();
    let description = format!("Refund of {amount} on order {number}: {reason}");
    let entry = ledger::post_by_purpose(
        "order",
        number.as_str(),
        &description,
        &[
            (AccountPurpose::SalesRevenue, from_revenue, Money::zero()),
            (AccountPurpose::CustomerDeposit, from_deposit, Money::zero()),
            (AccountPurpose::for_funding(source), Money::zero(), amount),
        ],
        now,
        &mut *conn,
    )
    .await?
    .ok_or_else(|| EngineError::Validation(format!("Refund of {amount} produced no ledger entry")))?;
    let wallet_tx = match source {
        FundingSource::Wallet => {
            let owner = order.wallet_owner();
            Some(wallets::credit_wallet(&owner, amount, number.as_str(), &description, now, &mut *conn).await?)
        },
        _ => None,
    };
    let log = NewOrderLog::new(actor, "refunded").with_note(format!("Refunded {amount}: {reason}")).visible();
    orders::insert_log(order.id, log, now, &mut *conn).await?;
    info!("📦️ {description}");
    Ok(RefundOutcome { order, amount, entry, wallet_tx })
}
