//! Checkout: stock reservation, pricing, the order row and its opening invoices, in one transaction.
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlx::SqliteConnection;

use super::{discounts, invoices, orders, products, settlement};
use crate::{
    db_types::{
        Invoice,
        InvoiceStatus,
        InvoiceType,
        Money,
        NewInvoice,
        NewOrder,
        NewOrderItem,
        NewOrderLog,
        OrderNumber,
        PaymentMethod,
        Product,
        SalesChannel,
    },
    helpers::{deposit_amount, deposit_rule, new_order_number},
    sqlite::db::{lifecycle, orders::OrderRecord},
    traits::{CheckoutResult, EngineError, PreOrderPolicy, SettlementRequest, ShipmentDetails},
};

/// Checks the requested lines and merges repeated products, keeping the order in which products first appear.
pub fn merge_lines(items: &[NewOrderItem]) -> Result<Vec<NewOrderItem>, EngineError> {
    if items.is_empty() {
        return Err(EngineError::Validation("An order needs at least one item".into()));
    }
    let mut merged: Vec<NewOrderItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(EngineError::Validation(format!(
                "Quantity for product {} must be positive, not {}",
                item.product_id, item.quantity
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => existing.quantity += item.quantity,
            None => merged.push(*item),
        }
    }
    Ok(merged)
}

/// Creates an order from a checkout request.
///
/// Stock is reserved before anything else is written, so the transaction holds the write lock from its first
/// statement and a sold-out product aborts the checkout without side effects. The first product in the basket decides
/// whether this is a pre-order.
pub async fn create_order(
    order: NewOrder,
    channel: SalesChannel,
    policy: PreOrderPolicy,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<CheckoutResult, EngineError> {
    let lines = merge_lines(&order.items)?;
    if order.shipping_cost.is_negative() {
        return Err(EngineError::Validation("Shipping cost cannot be negative".into()));
    }
    for line in &lines {
        products::reserve_stock(line.product_id, line.quantity, &mut *conn).await?;
    }
    let mut priced: Vec<(Product, i64)> = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = products::fetch_product(line.product_id, &mut *conn)
            .await?
            .ok_or(EngineError::ProductNotFound(line.product_id))?;
        priced.push((product, line.quantity));
    }
    let subtotal: Money = priced.iter().map(|(p, qty)| p.price * *qty).sum();
    let weight_grams = priced.iter().map(|(p, qty)| p.weight_grams * qty).sum();
    let units: i64 = priced.iter().map(|(_, qty)| qty).sum();
    let (discount_code, discount) = match order.discount_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => {
            let (code, amount) = discounts::redeem_discount_code(code, subtotal, now, &mut *conn).await?;
            (Some(code.code), amount)
        },
        None => (None, Money::zero()),
    };
    let total = subtotal - discount + order.shipping_cost;
    if !total.is_positive() {
        return Err(EngineError::Validation(format!("Order total must be positive, not {total}")));
    }
    let record = OrderRecord {
        order_number: new_order_number(now),
        user_id: order.user_id,
        channel,
        billing_address: order.billing_address,
        shipping_address: order.shipping_address,
        subtotal,
        shipping_cost: order.shipping_cost,
        discount_amount: discount,
        discount_code,
        total,
        payment_method: order.payment_method,
        weight_grams,
        notes: order.notes,
    };
    let created = orders::insert_order(record, now, &mut *conn).await?;
    let mut items = Vec::with_capacity(priced.len());
    for (product, qty) in &priced {
        items.push(orders::insert_order_item(created.id, product, *qty, &mut *conn).await?);
    }
    let first = &priced[0].0;
    let mut opened = Vec::with_capacity(2);
    if channel == SalesChannel::Online && first.is_preorder() {
        let rule = deposit_rule(first.preorder_config(), policy);
        let deposit = deposit_amount(rule, subtotal - discount, units, total);
        if !deposit.is_positive() {
            return Err(EngineError::Validation(format!(
                "The deposit for pre-order product {} works out to zero. Check the deposit settings.",
                first.sku
            )));
        }
        let balance = total - deposit;
        let deposit_invoice = (InvoiceType::Deposit, deposit, InvoiceStatus::Unpaid);
        opened.push(open_invoice(&created.order_number, created.id, deposit_invoice, now, &mut *conn).await?);
        if balance.is_positive() {
            let balance_invoice = (InvoiceType::Balance, balance, InvoiceStatus::PendingArrival);
            opened.push(open_invoice(&created.order_number, created.id, balance_invoice, now, &mut *conn).await?);
        }
        info!("📦️ Pre-order {} placed. Deposit {deposit}, balance {balance}", created.order_number);
    } else {
        let full_invoice = (InvoiceType::Full, total, InvoiceStatus::Unpaid);
        opened.push(open_invoice(&created.order_number, created.id, full_invoice, now, &mut *conn).await?);
        info!("📦️ Order {} placed for {total}", created.order_number);
    }
    let note = match &created.discount_code {
        Some(code) => format!("Order placed for {total} with code {code}"),
        None => format!("Order placed for {total}"),
    };
    orders::insert_log(created.id, NewOrderLog::new("customer", "created").with_note(note).visible(), now, &mut *conn)
        .await?;
    Ok(CheckoutResult { order: created, items, invoices: opened })
}

async fn open_invoice(
    number: &OrderNumber,
    order_id: i64,
    (invoice_type, amount, status): (InvoiceType, Money, InvoiceStatus),
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Invoice, EngineError> {
    debug!("📦️ Opening {invoice_type} invoice for {number}: {amount}");
    let invoice = NewInvoice { order_id: Some(order_id), user_id: None, invoice_type, amount, status, due_date: None };
    invoices::insert_invoice(invoice, now, conn).await
}

/// A point-of-sale sale. The customer pays at the till and walks out with the goods, so the full invoice is settled,
/// the stock deducted, and the order handed over, all before the transaction commits.
pub async fn create_pos_order(
    mut order: NewOrder,
    cashier: &str,
    policy: PreOrderPolicy,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<CheckoutResult, EngineError> {
    if order.payment_method.as_str().is_empty() {
        order.payment_method = PaymentMethod::cash();
    }
    let method = order.payment_method.clone();
    let created = create_order(order, SalesChannel::Pos, policy, now, &mut *conn).await?;
    let invoice = created
        .invoices
        .first()
        .cloned()
        .ok_or_else(|| EngineError::Validation(format!("No invoice was opened for {}", created.order.order_number)))?;
    let request = SettlementRequest::new(invoice.id, method, cashier, now);
    let result = settlement::finalize_invoice(&invoice, InvoiceStatus::Unpaid, &request, &mut *conn).await?;
    if matches!(result, settlement::Finalization::Changed) {
        return Err(EngineError::SettlementContention(invoice.invoice_number));
    }
    let handover = ShipmentDetails { courier: "pickup".into(), tracking_number: None };
    lifecycle::ship_order(created.order.id, handover, cashier, now, &mut *conn).await?;
    let order = lifecycle::confirm_delivery(created.order.id, cashier, now, &mut *conn).await?;
    let invoices = invoices::fetch_invoices_for_order(order.id, &mut *conn).await?;
    info!("📦️ POS sale {} completed by {cashier} for {}", order.order_number, order.total);
    Ok(CheckoutResult { order, items: created.items, invoices })
}
