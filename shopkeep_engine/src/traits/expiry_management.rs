use chrono::{DateTime, Utc};

use crate::{
    db_types::Invoice,
    traits::{
        data_objects::{ExpiredInvoice, ForfeitOutcome},
        EngineError,
    },
};

/// The time-based half of the invoice lifecycle. Every mutating method is guarded by a conditional update, so running
/// it twice (or from two sweepers at once) has the same effect as running it once.
#[allow(async_fn_in_trait)]
pub trait ExpiryManagement {
    /// Unpaid full, deposit and top-up invoices created at or before `cutoff`.
    async fn fetch_stale_invoices(&self, cutoff: DateTime<Utc>) -> Result<Vec<Invoice>, EngineError>;

    /// `unpaid → expired`, and cancels the invoice's order if it is still open. Returns `None` if the invoice was no
    /// longer unpaid.
    async fn expire_invoice(&self, invoice_id: i64, now: DateTime<Utc>) -> Result<Option<ExpiredInvoice>, EngineError>;

    /// Unpaid full, deposit and top-up invoices created at or before `cutoff` that have not had a reminder yet.
    async fn fetch_invoices_needing_reminder(&self, cutoff: DateTime<Utc>) -> Result<Vec<Invoice>, EngineError>;

    /// Sets `reminder_sent_at` if it is not set yet. Returns true if this call set it.
    async fn mark_reminder_sent(&self, invoice_id: i64, now: DateTime<Utc>) -> Result<bool, EngineError>;

    /// Activated (unpaid) balance invoices that have a due date.
    async fn fetch_due_balance_invoices(&self) -> Result<Vec<Invoice>, EngineError>;

    /// Raises the reminder stage of an invoice to `stage`. Returns true if the stage was lower before this call.
    async fn advance_reminder_stage(&self, invoice_id: i64, stage: i64, now: DateTime<Utc>)
        -> Result<bool, EngineError>;

    /// Expires an overdue balance invoice, cancels its order and moves the deposit to other income. Returns `None` if
    /// the invoice was no longer unpaid.
    async fn forfeit_overdue_balance(
        &self,
        invoice_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ForfeitOutcome>, EngineError>;
}
