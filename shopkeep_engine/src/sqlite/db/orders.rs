//! Orders, their items and their audit log.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{
        Address,
        Money,
        NewOrderLog,
        Order,
        OrderItem,
        OrderLog,
        OrderNumber,
        OrderStatusType,
        PaymentMethod,
        PaymentStatus,
        Product,
        SalesChannel,
        StockState,
    },
    order_objects::OrderQueryFilter,
    traits::EngineError,
};

/// The priced-up order row, ready to be inserted.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order_number: OrderNumber,
    pub user_id: Option<String>,
    pub channel: SalesChannel,
    pub billing_address: Address,
    pub shipping_address: Address,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub discount_amount: Money,
    pub discount_code: Option<String>,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub weight_grams: i64,
    pub notes: Option<String>,
}

pub async fn insert_order(
    order: OrderRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, EngineError> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_number,
                user_id,
                channel,
                billing_address,
                shipping_address,
                subtotal,
                shipping_cost,
                discount_amount,
                discount_code,
                total,
                remaining_balance,
                payment_method,
                weight_grams,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $11, $12, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(order.order_number)
    .bind(order.user_id)
    .bind(order.channel)
    .bind(Json(order.billing_address))
    .bind(Json(order.shipping_address))
    .bind(order.subtotal)
    .bind(order.shipping_cost)
    .bind(order.discount_amount)
    .bind(order.discount_code)
    .bind(order.total)
    .bind(order.payment_method)
    .bind(order.weight_grams)
    .bind(order.notes)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted with id {} for {}", order.order_number, order.id, order.total);
    Ok(order)
}

/// Adds a line to an order, snapshotting the product's price, name and cost at this moment.
pub async fn insert_order_item(
    order_id: i64,
    product: &Product,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_items
                (order_id, product_id, product_name, quantity, unit_price, line_total, cogs_per_unit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(product.id)
    .bind(&product.name)
    .bind(quantity)
    .bind(product.price)
    .bind(product.price * quantity)
    .bind(product.cost_price)
    .fetch_one(conn)
    .await
}

pub async fn fetch_order_by_number(
    number: &OrderNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_number = $1").bind(number.as_str()).fetch_optional(conn).await
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_shipment_id(
    shipment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE shipment_id = $1").bind(shipment_id).fetch_optional(conn).await
}

/// Fetches an order that must exist, e.g. because a foreign key points at it.
pub async fn fetch_existing_order(id: i64, conn: &mut SqliteConnection) -> Result<Order, EngineError> {
    fetch_order_by_id(id, conn).await?.ok_or(EngineError::OrderIdNotFound(id))
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_orders_for_product(
    product_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders WHERE status = $1 AND id IN (SELECT order_id FROM order_items WHERE product_id = $2)
            ORDER BY created_at
        "#,
    )
    .bind(status)
    .bind(product_id)
    .fetch_all(conn)
    .await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(user_id) = query.user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(user_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        let mut first = true;
        for status in statuses {
            if !first {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status);
            first = false;
        }
        where_clause.push_unseparated(")");
    }
    if let Some(payment_status) = query.payment_status {
        where_clause.push("payment_status = ");
        where_clause.push_bind_unseparated(payment_status);
    }
    if let Some(since) = query.since {
        where_clause.push("unixepoch(created_at) >= unixepoch(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("unixepoch(created_at) <= unixepoch(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<Order>().fetch_all(conn).await
}

pub async fn insert_log(
    order_id: i64,
    log: NewOrderLog,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderLog, sqlx::Error> {
    trace!("🗃️ Order {order_id}: [{}] {} {:?}", log.actor, log.action, log.note);
    sqlx::query_as(
        r#"
            INSERT INTO order_logs (order_id, actor, action, note, customer_visible, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(log.actor)
    .bind(log.action)
    .bind(log.note)
    .bind(log.customer_visible)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn fetch_logs(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderLog>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_logs WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// Moves an order to `to`, but only if its current status is one of `from`. Returns the updated order, or `None` if
/// the order was in some other status.
pub async fn transition_status(
    order_id: i64,
    from: &[OrderStatusType],
    to: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE id = ");
    builder.push_bind(order_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    builder.push(") RETURNING *");
    builder.build_query_as::<Order>().fetch_optional(conn).await
}

/// Records money received against an order. Deposits also accumulate in `deposit_paid`.
pub async fn apply_payment(
    order_id: i64,
    amount: Money,
    is_deposit: bool,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, EngineError> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                remaining_balance = remaining_balance - $1,
                deposit_paid = deposit_paid + CASE WHEN $2 THEN $1 ELSE 0 END,
                payment_status = CASE WHEN remaining_balance - $1 = 0 THEN $3 ELSE $4 END,
                updated_at = $5
            WHERE id = $6 AND remaining_balance >= $1
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(is_deposit)
    .bind(PaymentStatus::Paid)
    .bind(PaymentStatus::DepositPaid)
    .bind(now)
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    match order {
        Some(o) => Ok(o),
        None => {
            let order = fetch_existing_order(order_id, conn).await?;
            Err(EngineError::InconsistentStock(
                order.order_number.clone(),
                format!("a payment of {amount} exceeds the remaining balance of {}", order.remaining_balance),
            ))
        },
    }
}

/// `pre_order → payment_due`, or straight to `processing` when nothing is left to pay. A re-quoted shipping cost is
/// applied first, so the decision is made on the balance the customer actually owes.
///
/// Returns `None` if the order is not a pre-order, or if the new shipping cost would leave it overpaid.
pub async fn mark_arrived(
    order_id: i64,
    shipping_cost: Option<Money>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                total = total + (COALESCE($1, shipping_cost) - shipping_cost),
                remaining_balance = remaining_balance + (COALESCE($1, shipping_cost) - shipping_cost),
                shipping_cost = COALESCE($1, shipping_cost),
                status = CASE
                    WHEN remaining_balance + (COALESCE($1, shipping_cost) - shipping_cost) = 0 THEN $2 ELSE $3
                END,
                payment_status = CASE
                    WHEN remaining_balance + (COALESCE($1, shipping_cost) - shipping_cost) = 0 THEN $4
                    ELSE payment_status
                END,
                updated_at = $5
            WHERE id = $6 AND status = $7 AND remaining_balance + (COALESCE($1, shipping_cost) - shipping_cost) >= 0
            RETURNING *;
        "#,
    )
    .bind(shipping_cost)
    .bind(OrderStatusType::Processing)
    .bind(OrderStatusType::PaymentDue)
    .bind(PaymentStatus::Paid)
    .bind(now)
    .bind(order_id)
    .bind(OrderStatusType::PreOrder)
    .fetch_optional(conn)
    .await
}

/// Changes the stock state of an order, guarded on the state it is expected to be in.
pub async fn set_stock_state(
    order_id: i64,
    from: StockState,
    to: StockState,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET stock_state = $1 WHERE id = $2 AND stock_state = $3")
        .bind(to)
        .bind(order_id)
        .bind(from)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Marks an order as shipped and flags its revenue as recognized. Only a `processing` order (fully paid, or collected
/// at the till) can ship, which is also what makes revenue recognition happen once.
pub async fn mark_shipped(
    order_id: i64,
    courier: &str,
    tracking_number: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                courier = $2,
                tracking_number = COALESCE($3, tracking_number),
                shipped_at = $4,
                revenue_recognized = TRUE,
                updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(OrderStatusType::Shipped)
    .bind(courier)
    .bind(tracking_number)
    .bind(now)
    .bind(order_id)
    .bind(OrderStatusType::Processing)
    .fetch_optional(conn)
    .await
}

/// Stores a shipment booked with the provider. Only `processing` orders can be booked.
pub async fn set_shipment_booking(
    order_id: i64,
    shipment_id: &str,
    courier: &str,
    tracking_number: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET shipment_id = $1, courier = $2, tracking_number = $3, updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(shipment_id)
    .bind(courier)
    .bind(tracking_number)
    .bind(now)
    .bind(order_id)
    .bind(OrderStatusType::Processing)
    .fetch_optional(conn)
    .await
}

/// Cancels an order that is still in one of the cancellable statuses.
pub async fn mark_cancelled(
    order_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, cancel_reason = $2, cancelled_at = $3, updated_at = $3
            WHERE id = $4 AND status IN ($5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(OrderStatusType::Cancelled)
    .bind(reason)
    .bind(now)
    .bind(order_id)
    .bind(OrderStatusType::Pending)
    .bind(OrderStatusType::PreOrder)
    .bind(OrderStatusType::PaymentDue)
    .bind(OrderStatusType::Processing)
    .fetch_optional(conn)
    .await
}

pub async fn mark_delivered(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, delivered_at = $2, updated_at = $2
            WHERE id = $3 AND status = $4
            RETURNING *;
        "#,
    )
    .bind(OrderStatusType::Completed)
    .bind(now)
    .bind(order_id)
    .bind(OrderStatusType::Shipped)
    .fetch_optional(conn)
    .await
}

/// Records a refund against an order, guarded so that the cumulative refund never exceeds what was paid.
pub async fn record_refund(
    order_id: i64,
    amount: Money,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET
                refunded_amount = refunded_amount + $1,
                payment_status = CASE WHEN refunded_amount + $1 = total - remaining_balance THEN $2 ELSE $3 END,
                updated_at = $4
            WHERE id = $5 AND $1 > 0 AND refunded_amount + $1 <= total - remaining_balance
            RETURNING *;
        "#,
    )
    .bind(amount)
    .bind(PaymentStatus::Refunded)
    .bind(PaymentStatus::RefundedPartial)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Marks every paid amount of a cancelled order as returned to the customer.
pub async fn mark_fully_refunded(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, EngineError> {
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET refunded_amount = total - remaining_balance, payment_status = $1, updated_at = $2
            WHERE id = $3
            RETURNING *;
        "#,
    )
    .bind(PaymentStatus::Refunded)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    order.ok_or(EngineError::OrderIdNotFound(order_id))
}
