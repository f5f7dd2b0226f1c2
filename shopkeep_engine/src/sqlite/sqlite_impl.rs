//! `SqliteDatabase` is the concrete backend of the Shopkeep engine.
//!
//! It uses SQLite as the store and implements all the traits defined in the [`crate::traits`] module. Methods that
//! change more than one row open a transaction whose first statement is a write (a guarded update or an insert), so
//! the transaction holds SQLite's write lock before it reads anything it depends on.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::Migrator, SqlitePool};

use super::db::{
    checkout,
    db_url,
    discounts,
    invoices,
    ledger,
    lifecycle::{self, PaidAmountPolicy},
    new_pool,
    orders,
    payments,
    products,
    settings,
    settlement::{self, Finalization},
    wallets,
};
use crate::{
    db_types::{
        Account,
        DiscountCode,
        Invoice,
        InvoiceNumber,
        InvoiceStatus,
        InvoiceType,
        Money,
        NewDiscountCode,
        NewInvoice,
        NewJournalEntry,
        NewOrder,
        NewOrderLog,
        NewProduct,
        Order,
        OrderItem,
        OrderLog,
        OrderNumber,
        OrderStatusType,
        PaymentMethod,
        PaymentTransaction,
        PostedEntry,
        PreOrderConfig,
        Product,
        SalesChannel,
        Setting,
        Wallet,
        WalletTransaction,
    },
    order_objects::OrderQueryFilter,
    traits::{
        AccountPurpose,
        ArrivalDetails,
        CancelOutcome,
        CatalogManagement,
        CheckoutResult,
        EngineError,
        ExpiredInvoice,
        ExpiryManagement,
        ForfeitOutcome,
        InvoiceManagement,
        LedgerError,
        LedgerManagement,
        OrderManagement,
        PreOrderPolicy,
        Reconciliation,
        RefundOutcome,
        SettingsStore,
        SettlementOutcome,
        SettlementRequest,
        ShipOutcome,
        ShipmentBooking,
        ShipmentDetails,
        TrialBalance,
        WalletManagement,
    },
};

/// How many times a settlement re-reads the invoice after losing a race on its status before giving up.
const MAX_SETTLEMENT_ROUNDS: usize = 5;

static MIGRATOR: Migrator = sqlx::migrate!("./src/sqlite/migrations");

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn create_product(&self, product: NewProduct) -> Result<Product, EngineError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product(product_id, &mut conn).await?)
    }

    async fn fetch_product_by_sku(&self, sku: &str) -> Result<Option<Product>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(products::fetch_product_by_sku(sku, &mut conn).await?)
    }

    async fn receive_stock(&self, product_id: i64, quantity: i64) -> Result<Product, EngineError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::restock(product_id, quantity, &mut conn).await?;
        info!("🗃️ Received {quantity} units of {}. Stock is now {}", product.sku, product.stock);
        Ok(product)
    }

    async fn set_preorder_config(
        &self,
        product_id: i64,
        config: Option<PreOrderConfig>,
    ) -> Result<Product, EngineError> {
        let mut conn = self.pool.acquire().await?;
        products::set_preorder_config(product_id, config, &mut conn).await
    }

    async fn create_discount_code(&self, code: NewDiscountCode) -> Result<DiscountCode, EngineError> {
        let mut conn = self.pool.acquire().await?;
        discounts::insert_discount_code(code, &mut conn).await
    }

    async fn fetch_discount_code(&self, code: &str) -> Result<Option<DiscountCode>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(discounts::fetch_discount_code(code, &mut conn).await?)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn create_order(
        &self,
        order: NewOrder,
        policy: PreOrderPolicy,
        now: DateTime<Utc>,
    ) -> Result<CheckoutResult, EngineError> {
        let mut tx = self.pool.begin().await?;
        let result = checkout::create_order(order, SalesChannel::Online, policy, now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} committed", result.order.order_number);
        Ok(result)
    }

    async fn create_pos_order(
        &self,
        order: NewOrder,
        cashier: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckoutResult, EngineError> {
        let mut tx = self.pool.begin().await?;
        let result = checkout::create_pos_order(order, cashier, PreOrderPolicy::default(), now, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(number, &mut conn).await?)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn fetch_order_by_shipment_id(&self, shipment_id: &str) -> Result<Option<Order>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_shipment_id(shipment_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_items(order_id, &mut conn).await?)
    }

    async fn fetch_order_logs(&self, order_id: i64) -> Result<Vec<OrderLog>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_logs(order_id, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn fetch_orders_for_product(
        &self,
        product_id: i64,
        status: OrderStatusType,
    ) -> Result<Vec<Order>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_for_product(product_id, status, &mut conn).await?)
    }

    async fn mark_arrived(
        &self,
        order_id: i64,
        details: ArrivalDetails,
        due_date: DateTime<Utc>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, EngineError> {
        let mut tx = self.pool.begin().await?;
        let order = lifecycle::mark_arrived(order_id, details, due_date, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn record_shipment_booking(
        &self,
        order_id: i64,
        booking: ShipmentBooking,
        actor: &str,
    ) -> Result<Order, EngineError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let tracking = booking.tracking_number.as_deref();
        let updated =
            orders::set_shipment_booking(order_id, &booking.shipment_id, &booking.courier, tracking, now, &mut tx)
                .await?;
        let Some(order) = updated else {
            let order = orders::fetch_existing_order(order_id, &mut tx).await?;
            return Err(EngineError::InvalidTransition {
                order: order.order_number,
                from: order.status,
                action: "book a shipment for",
            });
        };
        let note = format!("Shipment {} booked with {}", booking.shipment_id, booking.courier);
        orders::insert_log(order.id, NewOrderLog::new(actor, "shipment_booked").with_note(note), now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn ship_order(
        &self,
        order_id: i64,
        details: ShipmentDetails,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;
        let outcome = lifecycle::ship_order(order_id, details, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn cancel_order(
        &self,
        order_id: i64,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;
        match lifecycle::cancel_order(order_id, reason, actor, PaidAmountPolicy::RefundToWallet, now, &mut tx).await? {
            Some(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            },
            None => {
                let order = orders::fetch_existing_order(order_id, &mut tx).await?;
                Err(EngineError::OrderNotCancellable { order: order.order_number, status: order.status })
            },
        }
    }

    async fn confirm_delivery(&self, order_id: i64, actor: &str, now: DateTime<Utc>) -> Result<Order, EngineError> {
        let mut tx = self.pool.begin().await?;
        let order = lifecycle::confirm_delivery(order_id, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn refund_order(
        &self,
        order_id: i64,
        amount: Money,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;
        let outcome = lifecycle::refund_order(order_id, amount, reason, actor, now, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn add_order_log(&self, order_id: i64, log: NewOrderLog) -> Result<OrderLog, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::insert_log(order_id, log, Utc::now(), &mut conn).await?)
    }
}

impl InvoiceManagement for SqliteDatabase {
    async fn fetch_invoice_by_number(&self, number: &InvoiceNumber) -> Result<Option<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoice_by_number(number, &mut conn).await?)
    }

    async fn fetch_invoice_by_id(&self, id: i64) -> Result<Option<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoice_by_id(id, &mut conn).await?)
    }

    async fn fetch_invoices_for_order(&self, order_id: i64) -> Result<Vec<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoices_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_attempts_for_invoice(&self, invoice_id: i64) -> Result<Vec<PaymentTransaction>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_attempts_for_invoice(invoice_id, &mut conn).await?)
    }

    async fn fetch_attempt_by_reference(&self, reference: &str) -> Result<Option<PaymentTransaction>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_attempt_by_reference(reference, &mut conn).await?)
    }

    async fn create_topup_invoice(
        &self,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Invoice, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(format!("Top-up amount must be positive, not {amount}")));
        }
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("Top-ups need a user".into()));
        }
        let invoice = NewInvoice {
            order_id: None,
            user_id: Some(user_id.to_string()),
            invoice_type: InvoiceType::Topup,
            amount,
            status: InvoiceStatus::Unpaid,
            due_date: None,
        };
        let mut conn = self.pool.acquire().await?;
        invoices::insert_invoice(invoice, now, &mut conn).await
    }

    async fn create_payment_attempt(
        &self,
        invoice_id: i64,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<PaymentTransaction, EngineError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_existing_invoice(invoice_id, &mut conn).await?;
        match payments::insert_pending_attempt(invoice.id, &invoice.invoice_number, &method, now, &mut conn).await? {
            Some(attempt) => Ok(attempt),
            None => {
                let invoice = invoices::fetch_existing_invoice(invoice_id, &mut conn).await?;
                if invoice.status.is_paid() {
                    Err(EngineError::InvoiceAlreadyPaid(invoice.invoice_number))
                } else {
                    Err(EngineError::InvoiceNotPayable { invoice: invoice.invoice_number, status: invoice.status })
                }
            },
        }
    }

    async fn record_gateway_reference(
        &self,
        attempt_id: i64,
        gateway_ref: &str,
        redirect_url: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PaymentTransaction, EngineError> {
        let mut conn = self.pool.acquire().await?;
        payments::record_gateway_reference(attempt_id, gateway_ref, redirect_url, now, &mut conn)
            .await?
            .ok_or_else(|| EngineError::ReferenceNotFound(format!("attempt {attempt_id}")))
    }

    async fn mark_attempt_failed(
        &self,
        attempt_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::mark_attempt_failed(attempt_id, reason, now, &mut conn).await?)
    }

    async fn mark_invoice_failed(
        &self,
        invoice_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Invoice, EngineError> {
        let mut conn = self.pool.acquire().await?;
        match invoices::transition_status(invoice_id, InvoiceStatus::Unpaid, InvoiceStatus::Failed, now, &mut conn)
            .await?
        {
            Some(invoice) => {
                warn!("🧾️ Invoice {} marked as failed: {reason}", invoice.invoice_number);
                Ok(invoice)
            },
            None => {
                let invoice = invoices::fetch_existing_invoice(invoice_id, &mut conn).await?;
                Err(EngineError::InvoiceNotPayable { invoice: invoice.invoice_number, status: invoice.status })
            },
        }
    }
}

impl Reconciliation for SqliteDatabase {
    /// Finalizes an invoice with compare-and-set on its status.
    ///
    /// Each round reads the invoice, decides what should happen, then applies it in a transaction whose first write is
    /// the guarded status change. Losing the race means the invoice moved under us, so the next round re-reads it.
    /// Usually the next read finds it paid and the answer is [`SettlementOutcome::AlreadyProcessed`].
    async fn settle_invoice(&self, request: SettlementRequest) -> Result<SettlementOutcome, EngineError> {
        for round in 1..=MAX_SETTLEMENT_ROUNDS {
            let invoice = {
                let mut conn = self.pool.acquire().await?;
                invoices::fetch_existing_invoice(request.invoice_id, &mut conn).await?
            };
            if invoice.status.is_paid() {
                debug!("🔄️ Invoice {} is already {}. Nothing to do.", invoice.invoice_number, invoice.status);
                return Ok(SettlementOutcome::AlreadyProcessed { invoice });
            }
            if !invoice.status.is_finalizable() {
                warn!("🔄️ Payment signal for invoice {} which is {}", invoice.invoice_number, invoice.status);
                return Err(EngineError::InvoiceNotPayable { invoice: invoice.invoice_number, status: invoice.status });
            }
            if let Some(received) = request.amount.filter(|a| *a != invoice.amount) {
                error!(
                    "🔄️ Amount mismatch on invoice {}: expected {}, gateway reported {received}",
                    invoice.invoice_number, invoice.amount
                );
                return Err(EngineError::AmountMismatch {
                    invoice: invoice.invoice_number,
                    expected: invoice.amount,
                    received,
                });
            }
            let mut tx = self.pool.begin().await?;
            match settlement::finalize_invoice(&invoice, invoice.status, &request, &mut tx).await? {
                Finalization::Applied { invoice, order, wallet_tx, late } => {
                    tx.commit().await?;
                    return Ok(if late {
                        SettlementOutcome::FinalizedLate { invoice, wallet_tx }
                    } else {
                        SettlementOutcome::Finalized { invoice, order }
                    });
                },
                Finalization::Changed => {
                    tx.rollback().await?;
                    let number = &invoice.invoice_number;
                    debug!("🔄️ Invoice {number} changed during settlement (round {round}). Retrying.");
                },
            }
        }
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_existing_invoice(request.invoice_id, &mut conn).await?;
        error!("🔄️ Gave up settling invoice {} after {MAX_SETTLEMENT_ROUNDS} rounds", invoice.invoice_number);
        Err(EngineError::SettlementContention(invoice.invoice_number))
    }

    async fn pay_with_wallet(
        &self,
        invoice_id: i64,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SettlementOutcome, EngineError> {
        let (invoice, order) = {
            let mut conn = self.pool.acquire().await?;
            let invoice = invoices::fetch_existing_invoice(invoice_id, &mut conn).await?;
            let order = match invoice.order_id {
                Some(id) => Some(orders::fetch_existing_order(id, &mut conn).await?),
                None => None,
            };
            (invoice, order)
        };
        if invoice.invoice_type == InvoiceType::Topup {
            return Err(EngineError::Validation("A wallet cannot be topped up from itself".into()));
        }
        if invoice.wallet_owner(order.as_ref()) != user_id {
            return Err(EngineError::Validation(format!(
                "Invoice {} does not belong to {user_id}",
                invoice.invoice_number
            )));
        }
        match invoice.status {
            InvoiceStatus::Unpaid => {},
            s if s.is_paid() => return Err(EngineError::InvoiceAlreadyPaid(invoice.invoice_number)),
            status => return Err(EngineError::InvoiceNotPayable { invoice: invoice.invoice_number, status }),
        }
        let request = SettlementRequest::new(invoice.id, PaymentMethod::wallet(), user_id, now);
        let mut tx = self.pool.begin().await?;
        match settlement::finalize_invoice(&invoice, InvoiceStatus::Unpaid, &request, &mut tx).await? {
            Finalization::Applied { invoice, order, .. } => {
                let number = invoice.invoice_number.as_str();
                let description = format!("Payment for invoice {number}");
                wallets::debit_wallet(user_id, invoice.amount, number, &description, now, &mut tx).await?;
                tx.commit().await?;
                info!("🔄️ Invoice {number} paid from the wallet of {user_id}");
                Ok(SettlementOutcome::Finalized { invoice, order })
            },
            Finalization::Changed => {
                tx.rollback().await?;
                let mut conn = self.pool.acquire().await?;
                let invoice = invoices::fetch_existing_invoice(invoice_id, &mut conn).await?;
                Err(EngineError::InvoiceNotPayable { invoice: invoice.invoice_number, status: invoice.status })
            },
        }
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn post_entry(&self, entry: NewJournalEntry) -> Result<PostedEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let posted = ledger::post_entry(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(posted)
    }

    async fn reverse_entry(
        &self,
        entry_id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<PostedEntry, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let posted = ledger::reverse_entry(entry_id, reason, now, &mut tx).await?;
        tx.commit().await?;
        Ok(posted)
    }

    async fn resolve_account(&self, purpose: AccountPurpose) -> Result<Account, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::resolve_account(purpose, &mut conn).await
    }

    async fn fetch_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_accounts(&mut conn).await?)
    }

    async fn fetch_account_by_code(&self, code: &str) -> Result<Option<Account>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        Ok(ledger::fetch_account_by_code(code, &mut conn).await?)
    }

    async fn fetch_entries_for_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<Vec<PostedEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries_for_reference(reference_type, reference_id, &mut conn).await
    }

    async fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::trial_balance(&mut conn).await
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_wallet(user_id, &mut conn).await?)
    }

    async fn fetch_wallet_history(&self, user_id: &str) -> Result<Vec<WalletTransaction>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(wallets::fetch_wallet_history(user_id, &mut conn).await?)
    }
}

impl ExpiryManagement for SqliteDatabase {
    async fn fetch_stale_invoices(&self, cutoff: DateTime<Utc>) -> Result<Vec<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_stale_invoices(cutoff, &mut conn).await?)
    }

    async fn expire_invoice(&self, invoice_id: i64, now: DateTime<Utc>) -> Result<Option<ExpiredInvoice>, EngineError> {
        let mut tx = self.pool.begin().await?;
        let expired =
            invoices::transition_status(invoice_id, InvoiceStatus::Unpaid, InvoiceStatus::Expired, now, &mut tx).await?;
        let Some(invoice) = expired else {
            trace!("🕰️ Invoice {invoice_id} is no longer unpaid. Not expiring it.");
            return Ok(None);
        };
        if !InvoiceType::EXPIRING.contains(&invoice.invoice_type) {
            tx.rollback().await?;
            let number = &invoice.invoice_number;
            debug!("🕰️ {} invoices do not expire. Leaving {number} alone.", invoice.invoice_type);
            return Ok(None);
        }
        let cancelled = match (invoice.order_id, invoice.invoice_type) {
            (Some(order_id), InvoiceType::Full | InvoiceType::Deposit) => {
                let reason = format!("Invoice {} was not paid in time", invoice.invoice_number);
                lifecycle::cancel_order(order_id, &reason, "system", PaidAmountPolicy::RefundToWallet, now, &mut tx)
                    .await?
            },
            _ => None,
        };
        tx.commit().await?;
        info!("🕰️ Invoice {} expired", invoice.invoice_number);
        Ok(Some(ExpiredInvoice { invoice, cancelled }))
    }

    async fn fetch_invoices_needing_reminder(&self, cutoff: DateTime<Utc>) -> Result<Vec<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_invoices_needing_reminder(cutoff, &mut conn).await?)
    }

    async fn mark_reminder_sent(&self, invoice_id: i64, now: DateTime<Utc>) -> Result<bool, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::mark_reminder_sent(invoice_id, now, &mut conn).await?)
    }

    async fn fetch_due_balance_invoices(&self) -> Result<Vec<Invoice>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::fetch_due_balance_invoices(&mut conn).await?)
    }

    async fn advance_reminder_stage(
        &self,
        invoice_id: i64,
        stage: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::advance_reminder_stage(invoice_id, stage, now, &mut conn).await?)
    }

    async fn forfeit_overdue_balance(
        &self,
        invoice_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ForfeitOutcome>, EngineError> {
        let mut tx = self.pool.begin().await?;
        let expired =
            invoices::transition_status(invoice_id, InvoiceStatus::Unpaid, InvoiceStatus::Expired, now, &mut tx).await?;
        let Some(invoice) = expired else {
            return Ok(None);
        };
        let overdue = invoice.due_date.map(|d| d <= now).unwrap_or(false);
        let Some(order_id) = invoice.order_id.filter(|_| invoice.invoice_type == InvoiceType::Balance && overdue) else {
            tx.rollback().await?;
            debug!("🕰️ Invoice {} is not an overdue balance. Leaving it alone.", invoice.invoice_number);
            return Ok(None);
        };
        let reason = format!("Balance invoice {} was not paid by its due date", invoice.invoice_number);
        let Some(cancelled) =
            lifecycle::cancel_order(order_id, &reason, "system", PaidAmountPolicy::ForfeitDeposit, now, &mut tx).await?
        else {
            tx.rollback().await?;
            warn!("🕰️ Order {order_id} could not be cancelled, so its deposit was not forfeited");
            return Ok(None);
        };
        tx.commit().await?;
        info!("🕰️ Balance invoice {} expired. {} forfeited.", invoice.invoice_number, cancelled.forfeited);
        Ok(Some(ForfeitOutcome { invoice, cancelled }))
    }
}

impl SettingsStore for SqliteDatabase {
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(settings::fetch_setting(key, &mut conn).await?.map(|s| s.value))
    }

    async fn fetch_all_settings(&self) -> Result<Vec<Setting>, EngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(settings::fetch_all_settings(&mut conn).await?)
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<Setting, EngineError> {
        let mut conn = self.pool.acquire().await?;
        let setting = settings::upsert_setting(key, value, &mut conn).await?;
        info!("🪛️ Setting {key} is now '{value}'");
        Ok(setting)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `SK_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        MIGRATOR.run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
