//! Invoices and their guarded status transitions.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Invoice, InvoiceNumber, InvoiceStatus, InvoiceType, Money, NewInvoice, PaymentMethod},
    helpers::new_invoice_number,
    traits::EngineError,
};

pub async fn insert_invoice(
    invoice: NewInvoice,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Invoice, EngineError> {
    let number = new_invoice_number(invoice.invoice_type, now);
    let invoice: Invoice = sqlx::query_as(
        r#"
            INSERT INTO invoices (invoice_number, order_id, user_id, invoice_type, amount, status, due_date, created_at,
                updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(number)
    .bind(invoice.order_id)
    .bind(invoice.user_id)
    .bind(invoice.invoice_type)
    .bind(invoice.amount)
    .bind(invoice.status)
    .bind(invoice.due_date)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ {} invoice {} for {} created ({})",
        invoice.invoice_type, invoice.invoice_number, invoice.amount, invoice.status
    );
    Ok(invoice)
}

pub async fn fetch_invoice_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_existing_invoice(id: i64, conn: &mut SqliteConnection) -> Result<Invoice, EngineError> {
    fetch_invoice_by_id(id, conn).await?.ok_or(EngineError::InvoiceIdNotFound(id))
}

pub async fn fetch_invoice_by_number(
    number: &InvoiceNumber,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE invoice_number = $1").bind(number.as_str()).fetch_optional(conn).await
}

pub async fn fetch_invoices_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_invoice_of_type(
    order_id: i64,
    invoice_type: InvoiceType,
    status: InvoiceStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE order_id = $1 AND invoice_type = $2 AND status = $3")
        .bind(order_id)
        .bind(invoice_type)
        .bind(status)
        .fetch_optional(conn)
        .await
}

/// The guarded transition at the heart of settlement: moves the invoice to `paid` or `paid_late`, but only if its
/// status is still exactly `prior`. `None` means the invoice changed since it was read.
pub async fn finalize_guard(
    invoice_id: i64,
    prior: InvoiceStatus,
    to: InvoiceStatus,
    method: &PaymentMethod,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    trace!("🗃️ Finalize guard for invoice {invoice_id}: {prior} -> {to}");
    sqlx::query_as(
        r#"
            UPDATE invoices SET status = $1, paid_at = $2, payment_method = $3, updated_at = $2
            WHERE id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(now)
    .bind(method)
    .bind(invoice_id)
    .bind(prior)
    .fetch_optional(conn)
    .await
}

/// Moves an invoice from `from` to `to`. Returns the updated invoice, or `None` if it was in some other status.
pub async fn transition_status(
    invoice_id: i64,
    from: InvoiceStatus,
    to: InvoiceStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("UPDATE invoices SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING *")
        .bind(to)
        .bind(now)
        .bind(invoice_id)
        .bind(from)
        .fetch_optional(conn)
        .await
}

/// Cancels every invoice of the order that is still waiting for money.
pub async fn cancel_open_invoices(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE invoices SET status = $1, updated_at = $2
            WHERE order_id = $3 AND status IN ($4, $5)
            RETURNING *;
        "#,
    )
    .bind(InvoiceStatus::Cancelled)
    .bind(now)
    .bind(order_id)
    .bind(InvoiceStatus::Unpaid)
    .bind(InvoiceStatus::PendingArrival)
    .fetch_all(conn)
    .await
}

/// `pending_arrival → unpaid` for the balance invoice of an order, with the new amount and due date.
pub async fn activate_balance_invoice(
    order_id: i64,
    amount: Money,
    due_date: DateTime<Utc>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE invoices SET status = $1, amount = $2, due_date = $3, updated_at = $4
            WHERE order_id = $5 AND invoice_type = $6 AND status = $7
            RETURNING *;
        "#,
    )
    .bind(InvoiceStatus::Unpaid)
    .bind(amount)
    .bind(due_date)
    .bind(now)
    .bind(order_id)
    .bind(InvoiceType::Balance)
    .bind(InvoiceStatus::PendingArrival)
    .fetch_optional(conn)
    .await
}

/// Unpaid invoices of the expiring types created at or before `cutoff`.
pub async fn fetch_stale_invoices(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM invoices
            WHERE status = $1 AND invoice_type IN ($2, $3, $4) AND unixepoch(created_at) <= unixepoch($5)
            ORDER BY created_at
        "#,
    )
    .bind(InvoiceStatus::Unpaid)
    .bind(InvoiceType::Full)
    .bind(InvoiceType::Deposit)
    .bind(InvoiceType::Topup)
    .bind(cutoff)
    .fetch_all(conn)
    .await
}

pub async fn fetch_invoices_needing_reminder(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM invoices
            WHERE status = $1 AND invoice_type IN ($2, $3, $4) AND reminder_sent_at IS NULL
              AND unixepoch(created_at) <= unixepoch($5)
            ORDER BY created_at
        "#,
    )
    .bind(InvoiceStatus::Unpaid)
    .bind(InvoiceType::Full)
    .bind(InvoiceType::Deposit)
    .bind(InvoiceType::Topup)
    .bind(cutoff)
    .fetch_all(conn)
    .await
}

pub async fn mark_reminder_sent(
    invoice_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE invoices SET reminder_sent_at = $1 WHERE id = $2 AND reminder_sent_at IS NULL AND status = $3",
    )
    .bind(now)
    .bind(invoice_id)
    .bind(InvoiceStatus::Unpaid)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_due_balance_invoices(conn: &mut SqliteConnection) -> Result<Vec<Invoice>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM invoices WHERE status = $1 AND invoice_type = $2 AND due_date IS NOT NULL
            ORDER BY due_date
        "#,
    )
    .bind(InvoiceStatus::Unpaid)
    .bind(InvoiceType::Balance)
    .fetch_all(conn)
    .await
}

pub async fn advance_reminder_stage(
    invoice_id: i64,
    stage: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE invoices SET reminder_stage = $1, reminder_sent_at = $2
            WHERE id = $3 AND reminder_stage < $1 AND status = $4
        "#,
    )
    .bind(stage)
    .bind(now)
    .bind(invoice_id)
    .bind(InvoiceStatus::Unpaid)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
