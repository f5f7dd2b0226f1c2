use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Invoice, InvoiceNumber, Money, OrderNumber, PaymentTransaction},
    order_objects::InvoiceDetail,
    traits::{EngineError, InvoiceManagement, OrderManagement},
};

/// Access to invoices and their payment attempts. Paying invoices is the job of
/// [`crate::ske_api::reconciliation_api::ReconciliationApi`].
pub struct InvoiceApi<B> {
    db: B,
}

impl<B> Debug for InvoiceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InvoiceApi")
    }
}

impl<B> InvoiceApi<B>
where B: InvoiceManagement + OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn fetch_invoice(&self, number: &InvoiceNumber) -> Result<Invoice, EngineError> {
        self.db.fetch_invoice_by_number(number).await?.ok_or_else(|| EngineError::InvoiceNotFound(number.clone()))
    }

    pub async fn invoice_detail(&self, number: &InvoiceNumber) -> Result<InvoiceDetail, EngineError> {
        let invoice = self.fetch_invoice(number).await?;
        let attempts = self.db.fetch_attempts_for_invoice(invoice.id).await?;
        Ok(InvoiceDetail { invoice, attempts })
    }

    pub async fn invoices_for_order(&self, number: &OrderNumber) -> Result<Vec<Invoice>, EngineError> {
        let order =
            self.db.fetch_order_by_number(number).await?.ok_or_else(|| EngineError::OrderNotFound(number.clone()))?;
        self.db.fetch_invoices_for_order(order.id).await
    }

    pub async fn payment_attempts(&self, number: &InvoiceNumber) -> Result<Vec<PaymentTransaction>, EngineError> {
        let invoice = self.fetch_invoice(number).await?;
        self.db.fetch_attempts_for_invoice(invoice.id).await
    }

    /// Opens a standalone invoice that credits `user_id`'s wallet once paid.
    pub async fn create_topup(&self, user_id: &str, amount: Money) -> Result<Invoice, EngineError> {
        let invoice = self.db.create_topup_invoice(user_id.trim(), amount, Utc::now()).await?;
        info!("🧾️ Top-up invoice {} for {amount} opened for {user_id}", invoice.invoice_number);
        Ok(invoice)
    }

    /// Admin transition of an unpaid invoice to `failed`. A payment that still arrives later is treated as late.
    pub async fn mark_failed(&self, number: &InvoiceNumber, reason: &str) -> Result<Invoice, EngineError> {
        let invoice = self.fetch_invoice(number).await?;
        let invoice = self.db.mark_invoice_failed(invoice.id, reason, Utc::now()).await?;
        info!("🧾️ Invoice {} marked as failed. {reason}", invoice.invoice_number);
        Ok(invoice)
    }
}
