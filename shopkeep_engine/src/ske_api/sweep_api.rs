//! The expiration sweep.
//!
//! One call to [`SweepApi::run`] performs, in order:
//! 1. expiry of unpaid full, deposit and top-up invoices older than the invoice TTL, cancelling their orders;
//! 2. a single "about to expire" reminder for unpaid invoices past the reminder age;
//! 3. staged reminders for balance invoices that are coming due, and forfeiture of the deposit once they are overdue.
//!
//! Each step is a guarded update in the backend, so overlapping runs (from a slow tick, or from several server
//! instances) never send a reminder twice or forfeit a deposit twice. A failure on one invoice is logged and the sweep
//! moves on to the next.
use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use serde::Serialize;

use crate::{
    db_types::{Invoice, InvoiceNumber, OrderNumber},
    events::{DepositForfeitedEvent, EventProducers, InvoiceReminderEvent, OrderCancelledEvent, ReminderKind},
    ske_api::settings_api::SettingsApi,
    traits::{EngineError, ExpiryManagement, SettingsStore},
};

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub expired: Vec<InvoiceNumber>,
    pub cancelled_orders: Vec<OrderNumber>,
    pub reminders: usize,
    pub forfeited: Vec<OrderNumber>,
    /// Invoices that could not be processed this time round.
    pub errors: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() &&
            self.cancelled_orders.is_empty() &&
            self.reminders == 0 &&
            self.forfeited.is_empty() &&
            self.errors == 0
    }
}

pub struct SweepApi<B> {
    db: B,
    settings: Arc<SettingsApi<B>>,
    producers: EventProducers,
}

impl<B> Debug for SweepApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SweepApi")
    }
}

impl<B> SweepApi<B>
where B: ExpiryManagement + SettingsStore
{
    pub fn new(db: B, settings: Arc<SettingsApi<B>>, producers: EventProducers) -> Self {
        Self { db, settings, producers }
    }

    /// Runs one sweep as of `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let mut report = SweepReport::default();
        self.expire_stale_invoices(now, &mut report).await?;
        self.send_expiry_reminders(now, &mut report).await?;
        self.process_balances(now, &mut report).await?;
        if report.is_empty() {
            trace!("🕰️ Sweep found nothing to do");
        } else {
            info!(
                "🕰️ Sweep done. Expired: {}, cancelled: {}, reminders: {}, forfeited: {}, errors: {}",
                report.expired.len(),
                report.cancelled_orders.len(),
                report.reminders,
                report.forfeited.len(),
                report.errors
            );
        }
        Ok(report)
    }

    async fn expire_stale_invoices(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), EngineError> {
        let cutoff = now - self.settings.invoice_ttl().await?;
        let stale = self.db.fetch_stale_invoices(cutoff).await?;
        for invoice in stale {
            match self.db.expire_invoice(invoice.id, now).await {
                Ok(Some(expired)) => {
                    debug!("🕰️ Invoice {} expired", invoice.invoice_number);
                    report.expired.push(expired.invoice.invoice_number.clone());
                    if let Some(cancelled) = expired.cancelled {
                        report.cancelled_orders.push(cancelled.order.order_number.clone());
                        let event = OrderCancelledEvent::new(cancelled.order, cancelled.refunded, cancelled.forfeited);
                        self.producers.publish_order_cancelled(event).await;
                    }
                },
                Ok(None) => trace!("🕰️ Invoice {} was settled before it could expire", invoice.invoice_number),
                Err(e) => {
                    error!("🕰️ Could not expire invoice {}. {e}", invoice.invoice_number);
                    report.errors += 1;
                },
            }
        }
        Ok(())
    }

    async fn send_expiry_reminders(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), EngineError> {
        let cutoff = now - self.settings.invoice_reminder_after().await?;
        let due = self.db.fetch_invoices_needing_reminder(cutoff).await?;
        for invoice in due {
            match self.db.mark_reminder_sent(invoice.id, now).await {
                Ok(true) => {
                    debug!("🕰️ Invoice {} is about to expire. Sending a reminder.", invoice.invoice_number);
                    report.reminders += 1;
                    let event = InvoiceReminderEvent { invoice, kind: ReminderKind::ExpiringSoon };
                    self.producers.publish_invoice_reminder(event).await;
                },
                Ok(false) => trace!("🕰️ Reminder for {} was already sent", invoice.invoice_number),
                Err(e) => {
                    error!("🕰️ Could not record the reminder for invoice {}. {e}", invoice.invoice_number);
                    report.errors += 1;
                },
            }
        }
        Ok(())
    }

    async fn process_balances(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<(), EngineError> {
        let thresholds = self.settings.balance_reminder_days().await?;
        let balances = self.db.fetch_due_balance_invoices().await?;
        for invoice in balances {
            let Some(due_date) = invoice.due_date else {
                warn!("🕰️ Balance invoice {} is unpaid but has no due date", invoice.invoice_number);
                continue;
            };
            let result = if due_date <= now {
                self.forfeit(&invoice, now, report).await
            } else {
                self.remind_balance(invoice.clone(), due_date, now, &thresholds, report).await
            };
            if let Err(e) = result {
                error!("🕰️ Could not process balance invoice {}. {e}", invoice.invoice_number);
                report.errors += 1;
            }
        }
        Ok(())
    }

    async fn forfeit(
        &self,
        invoice: &Invoice,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let Some(outcome) = self.db.forfeit_overdue_balance(invoice.id, now).await? else {
            trace!("🕰️ Balance invoice {} was dealt with before it could be forfeited", invoice.invoice_number);
            return Ok(());
        };
        let cancelled = outcome.cancelled;
        info!(
            "🕰️ Balance {} is overdue. Order {} cancelled and a deposit of {} forfeited",
            invoice.invoice_number, cancelled.order.order_number, cancelled.forfeited
        );
        report.forfeited.push(cancelled.order.order_number.clone());
        report.cancelled_orders.push(cancelled.order.order_number.clone());
        let event = DepositForfeitedEvent {
            order: cancelled.order.clone(),
            invoice: outcome.invoice,
            forfeited: cancelled.forfeited,
        };
        self.producers.publish_deposit_forfeited(event).await;
        let event = OrderCancelledEvent::new(cancelled.order, cancelled.refunded, cancelled.forfeited);
        self.producers.publish_order_cancelled(event).await;
        Ok(())
    }

    async fn remind_balance(
        &self,
        invoice: Invoice,
        due_date: DateTime<Utc>,
        now: DateTime<Utc>,
        thresholds: &[i64],
        report: &mut SweepReport,
    ) -> Result<(), EngineError> {
        let Some((stage, days)) = reminder_stage(due_date, now, thresholds) else {
            return Ok(());
        };
        if stage <= invoice.reminder_stage {
            return Ok(());
        }
        if self.db.advance_reminder_stage(invoice.id, stage, now).await? {
            debug!("🕰️ Balance {} is due within {days} day(s). Sending reminder {stage}.", invoice.invoice_number);
            report.reminders += 1;
            let event = InvoiceReminderEvent { invoice, kind: ReminderKind::BalanceDue { days } };
            self.producers.publish_invoice_reminder(event).await;
        }
        Ok(())
    }
}

/// The reminder stage a balance invoice due at `due_date` has reached, with its threshold in days.
///
/// `thresholds` are largest first; stage `n` is reached once the due date is at most `thresholds[n - 1]` days away.
/// Returns `None` before the first threshold.
pub fn reminder_stage(due_date: DateTime<Utc>, now: DateTime<Utc>, thresholds: &[i64]) -> Option<(i64, i64)> {
    let remaining = due_date - now;
    thresholds
        .iter()
        .enumerate()
        .filter(|(_, days)| remaining <= chrono::Duration::days(**days))
        .last()
        .map(|(i, days)| (i as i64 + 1, *days))
}
