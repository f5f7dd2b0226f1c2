//! Payment attempts (`payment_transactions`).
use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{AttemptStatus, InvoiceNumber, InvoiceStatus, PaymentMethod, PaymentTransaction},
    helpers::new_merchant_ref,
    traits::EngineError,
};

/// Opens a pending attempt for an invoice, guarded on the invoice being `unpaid`. Returns `None` if it is not.
pub async fn insert_pending_attempt(
    invoice_id: i64,
    invoice_number: &InvoiceNumber,
    method: &PaymentMethod,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    let merchant_ref = new_merchant_ref(invoice_number);
    let attempt: Option<PaymentTransaction> = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (invoice_id, merchant_ref, payment_method, amount, status, created_at,
                updated_at)
            SELECT id, $1, $2, amount, $3, $4, $4 FROM invoices WHERE id = $5 AND status = $6
            RETURNING *;
        "#,
    )
    .bind(merchant_ref)
    .bind(method)
    .bind(AttemptStatus::Pending)
    .bind(now)
    .bind(invoice_id)
    .bind(InvoiceStatus::Unpaid)
    .fetch_optional(conn)
    .await?;
    if let Some(a) = &attempt {
        debug!("🗃️ Payment attempt {} opened for invoice {invoice_number} ({})", a.merchant_ref, a.amount);
    }
    Ok(attempt)
}

/// Records an attempt that settled without going through the gateway (wallet, cash, manual confirmation, or a
/// settlement that could only be matched by invoice number).
pub async fn insert_settled_attempt(
    invoice_id: i64,
    merchant_ref: &str,
    gateway_ref: Option<&str>,
    method: &PaymentMethod,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, EngineError> {
    let attempt = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (invoice_id, merchant_ref, gateway_ref, payment_method, amount, status,
                created_at, updated_at)
            SELECT id, $1, $2, $3, amount, $4, $5, $5 FROM invoices WHERE id = $6
            RETURNING *;
        "#,
    )
    .bind(merchant_ref)
    .bind(gateway_ref)
    .bind(method)
    .bind(AttemptStatus::Success)
    .bind(now)
    .bind(invoice_id)
    .fetch_optional(conn)
    .await?;
    attempt.ok_or(EngineError::InvoiceIdNotFound(invoice_id))
}

pub async fn fetch_attempt_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM payment_transactions WHERE merchant_ref = $1 OR gateway_ref = $1
            ORDER BY merchant_ref = $1 DESC LIMIT 1
        "#,
    )
    .bind(reference)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_attempt_by_id(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_attempts_for_invoice(
    invoice_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE invoice_id = $1 ORDER BY id")
        .bind(invoice_id)
        .fetch_all(conn)
        .await
}

pub async fn record_gateway_reference(
    attempt_id: i64,
    gateway_ref: &str,
    redirect_url: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payment_transactions SET gateway_ref = $1, redirect_url = COALESCE($2, redirect_url), updated_at = $3
            WHERE id = $4
            RETURNING *;
        "#,
    )
    .bind(gateway_ref)
    .bind(redirect_url)
    .bind(now)
    .bind(attempt_id)
    .fetch_optional(conn)
    .await
}

/// `pending → success`. A gateway reference, if given, is stored when the attempt does not have one yet.
pub async fn mark_attempt_success(
    attempt_id: i64,
    gateway_ref: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE payment_transactions SET status = $1, gateway_ref = COALESCE(gateway_ref, $2), updated_at = $3
            WHERE id = $4 AND status != $1
        "#,
    )
    .bind(AttemptStatus::Success)
    .bind(gateway_ref)
    .bind(now)
    .bind(attempt_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_attempt_failed(
    attempt_id: i64,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE payment_transactions SET status = $1, failure_reason = $2, updated_at = $3
            WHERE id = $4 AND status = $5
        "#,
    )
    .bind(AttemptStatus::Failed)
    .bind(reason)
    .bind(now)
    .bind(attempt_id)
    .bind(AttemptStatus::Pending)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
