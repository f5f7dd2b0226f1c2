use chrono::{DateTime, Utc};

use crate::{
    db_types::{Invoice, InvoiceNumber, Money, PaymentMethod, PaymentTransaction},
    traits::EngineError,
};

/// Invoices and the payment attempts made against them.
#[allow(async_fn_in_trait)]
pub trait InvoiceManagement {
    async fn fetch_invoice_by_number(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, EngineError>;

    async fn fetch_invoice_by_id(&self, id: i64) -> Result<Option<Invoice>, EngineError>;

    async fn fetch_invoices_for_order(&self, order_id: i64) -> Result<Vec<Invoice>, EngineError>;

    async fn fetch_attempts_for_invoice(&self, invoice_id: i64) -> Result<Vec<PaymentTransaction>, EngineError>;

    /// Looks a payment attempt up by merchant reference, then by gateway reference.
    async fn fetch_attempt_by_reference(&self, reference: &str) -> Result<Option<PaymentTransaction>, EngineError>;

    /// Opens a standalone wallet top-up invoice.
    async fn create_topup_invoice(
        &self,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Invoice, EngineError>;

    /// Records a new `pending` payment attempt with a fresh merchant reference. The invoice must be `unpaid`.
    async fn create_payment_attempt(
        &self,
        invoice_id: i64,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<PaymentTransaction, EngineError>;

    /// Stores what the gateway told us when the charge was submitted.
    async fn record_gateway_reference(
        &self,
        attempt_id: i64,
        gateway_ref: &str,
        redirect_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentTransaction, EngineError>;

    /// `pending → failed` for a payment attempt. Returns false if the attempt was not pending.
    async fn mark_attempt_failed(&self, attempt_id: i64, reason: &str, now: DateTime<Utc>) -> Result<bool, EngineError>;

    /// Admin transition `unpaid → failed`.
    async fn mark_invoice_failed(&self, invoice_id: i64, reason: &str, now: DateTime<Utc>)
        -> Result<Invoice, EngineError>;
}
