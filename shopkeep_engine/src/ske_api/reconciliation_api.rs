//! Payment reconciliation.
//!
//! A payment can be reported by a signed push notification from the gateway, by the customer landing on the return
//! page, or by the engine asking the gateway itself. All three end in [`Reconciliation::settle_invoice`], whose status
//! guard makes sure that an invoice is paid exactly once no matter how many of them arrive, or in which order.
use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use shopkeep_common::Secret;

use crate::{
    db_types::{
        AttemptStatus,
        FundingSource,
        Invoice,
        InvoiceNumber,
        Order,
        OrderNumber,
        PaymentMethod,
        PaymentTransaction,
    },
    events::{EventProducers, OrderPaidEvent, PaymentLateEvent, WalletCreditedEvent},
    helpers::verify_hmac,
    order_objects::PaymentSession,
    ske_api::{call_with_timeout, DEFAULT_EXTERNAL_TIMEOUT},
    traits::{
        ChargeRequest,
        EngineError,
        GatewayNotification,
        GatewayPaymentStatus,
        InvoiceManagement,
        OrderManagement,
        PaymentGateway,
        Reconciliation,
        SettlementOutcome,
        SettlementRequest,
    },
};

/// The method recorded when a gateway confirms a payment without saying how it was made.
pub const UNSPECIFIED_GATEWAY_METHOD: &str = "gateway";

pub struct ReconciliationApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    signing_key: Secret<String>,
    timeout: Duration,
}

impl<B, G> Debug for ReconciliationApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B, G> ReconciliationApi<B, G> {
    /// `signing_key` is the secret the gateway signs its notifications with. With an empty key, every notification is
    /// rejected.
    pub fn new(db: B, gateway: G, producers: EventProducers, signing_key: Secret<String>) -> Self {
        Self { db, gateway, producers, signing_key, timeout: DEFAULT_EXTERNAL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<B, G> ReconciliationApi<B, G>
where
    B: Reconciliation + InvoiceManagement + OrderManagement,
    G: PaymentGateway,
{
    /// Starts a gateway payment for an invoice.
    ///
    /// A pending attempt is recorded before the gateway is called, so that a notification racing the response can
    /// still be matched. If the gateway fails, the attempt stays pending and the error is returned; the customer can
    /// simply try again.
    pub async fn start_payment(
        &self,
        number: &InvoiceNumber,
        method: PaymentMethod,
    ) -> Result<PaymentSession, EngineError> {
        if method.funding_source() == FundingSource::Wallet {
            return Err(EngineError::Validation("Wallet payments do not go through the payment gateway".into()));
        }
        let invoice = self.fetch_invoice(number).await?;
        let attempt = self.db.create_payment_attempt(invoice.id, method.clone(), Utc::now()).await?;
        let order = match invoice.order_id {
            Some(id) => self.db.fetch_order_by_id(id).await?,
            None => None,
        };
        let request = charge_request(&invoice, &attempt, order.as_ref(), method);
        let response = match call_with_timeout("payment gateway", self.timeout, self.gateway.submit(request)).await {
            Ok(r) => r,
            Err(e) => {
                warn!("🔄️ Gateway did not accept attempt {} for invoice {number}. {e}", attempt.merchant_ref);
                return Err(e.into());
            },
        };
        let redirect_url = response.redirect_url.clone();
        let attempt = self
            .db
            .record_gateway_reference(attempt.id, &response.gateway_ref, redirect_url.as_deref(), Utc::now())
            .await?;
        info!(
            "🔄️ Payment attempt {} for invoice {number} registered with the gateway as {}",
            attempt.merchant_ref, response.gateway_ref
        );
        if response.status != GatewayPaymentStatus::Pending {
            debug!("🔄️ Gateway reported {:?} straight away for {}", response.status, attempt.merchant_ref);
        }
        Ok(PaymentSession { invoice, attempt, redirect_url })
    }

    /// Handles a push notification from the gateway. The signature over the raw body is checked before anything in
    /// the body is looked at.
    pub async fn handle_notification(&self, body: &[u8], signature: &str) -> Result<SettlementOutcome, EngineError> {
        if self.signing_key.is_empty() || !verify_hmac(self.signing_key.reveal(), body, signature) {
            warn!("🔐️ Rejected a gateway notification with an invalid signature");
            return Err(EngineError::InvalidSignature);
        }
        let notification = self.gateway.parse_notification(body)?;
        trace!("🔄️ Gateway notification: {notification:?}");
        self.apply_gateway_status(notification, "gateway").await
    }

    /// The customer came back from the gateway's payment page. Nothing in the query string is trusted, so the
    /// gateway is asked directly.
    pub async fn handle_return(&self, merchant_ref: &str) -> Result<SettlementOutcome, EngineError> {
        self.inquire(merchant_ref).await
    }

    /// Asks the gateway for the state of one payment attempt and applies the answer.
    pub async fn inquire(&self, merchant_ref: &str) -> Result<SettlementOutcome, EngineError> {
        let inquiry = self.gateway.inquire(merchant_ref);
        let notification = call_with_timeout("payment gateway", self.timeout, inquiry).await?;
        self.apply_gateway_status(notification, "inquiry").await
    }

    /// Checks every pending attempt of the order's open invoices with the gateway.
    pub async fn check_order_status(&self, number: &OrderNumber) -> Result<Vec<SettlementOutcome>, EngineError> {
        let order =
            self.db.fetch_order_by_number(number).await?.ok_or_else(|| EngineError::OrderNotFound(number.clone()))?;
        Ok(self.refresh_order(&order).await)
    }

    /// Like [`Self::check_order_status`], but never fails. Gateway or database trouble is logged, and whatever could
    /// be checked is returned. Used on read paths, where a gateway outage must not break the page.
    pub async fn refresh_order(&self, order: &Order) -> Vec<SettlementOutcome> {
        let invoices = match self.db.fetch_invoices_for_order(order.id).await {
            Ok(i) => i,
            Err(e) => {
                warn!("🔄️ Could not load invoices for order {}. {e}", order.order_number);
                return Vec::new();
            },
        };
        let mut outcomes = Vec::new();
        for invoice in invoices.iter().filter(|i| i.status.is_finalizable()) {
            let attempts = match self.db.fetch_attempts_for_invoice(invoice.id).await {
                Ok(a) => a,
                Err(e) => {
                    warn!("🔄️ Could not load payment attempts for invoice {}. {e}", invoice.invoice_number);
                    continue;
                },
            };
            for attempt in attempts.iter().filter(|a| a.status == AttemptStatus::Pending) {
                match self.inquire(&attempt.merchant_ref).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => warn!("🔄️ Status check for {} failed. {e}", attempt.merchant_ref),
                }
            }
        }
        outcomes
    }

    /// An admin confirms that an invoice was paid outside the gateway, e.g. by bank transfer.
    pub async fn confirm_manually(
        &self,
        number: &InvoiceNumber,
        method: PaymentMethod,
        actor: &str,
    ) -> Result<SettlementOutcome, EngineError> {
        let invoice = self.fetch_invoice(number).await?;
        let request = SettlementRequest::new(invoice.id, method, actor, Utc::now());
        let outcome = self.db.settle_invoice(request).await?;
        info!("🔄️ Invoice {number} confirmed manually by {actor}");
        self.publish_settlement(&outcome).await;
        Ok(outcome)
    }

    /// Pays an invoice from `user_id`'s store credit.
    pub async fn pay_with_wallet(
        &self,
        number: &InvoiceNumber,
        user_id: &str,
    ) -> Result<SettlementOutcome, EngineError> {
        let invoice = self.fetch_invoice(number).await?;
        let outcome = self.db.pay_with_wallet(invoice.id, user_id, Utc::now()).await?;
        self.publish_settlement(&outcome).await;
        Ok(outcome)
    }

    /// Applies what the gateway said about a payment attempt.
    ///
    /// Failed and expired attempts are marked as such, but the invoice stays payable. Pending attempts change nothing.
    pub async fn apply_gateway_status(
        &self,
        notification: GatewayNotification,
        actor: &str,
    ) -> Result<SettlementOutcome, EngineError> {
        let (invoice, attempt) = self.resolve_reference(&notification).await?;
        let now = Utc::now();
        match notification.status {
            GatewayPaymentStatus::Paid => {
                let method = notification
                    .method
                    .or_else(|| attempt.as_ref().map(|a| a.payment_method.clone()))
                    .unwrap_or_else(|| PaymentMethod::from(UNSPECIFIED_GATEWAY_METHOD));
                let mut request = SettlementRequest::new(invoice.id, method, actor, now);
                if let Some(attempt) = &attempt {
                    request = request.with_attempt(attempt.id);
                }
                if let Some(gateway_ref) = notification.gateway_ref {
                    request = request.with_gateway_ref(gateway_ref);
                }
                if let Some(amount) = notification.amount {
                    request = request.with_amount(amount);
                }
                let outcome = self.db.settle_invoice(request).await?;
                self.publish_settlement(&outcome).await;
                Ok(outcome)
            },
            _ if invoice.status.is_paid() => Ok(SettlementOutcome::AlreadyProcessed { invoice }),
            GatewayPaymentStatus::Pending => Ok(SettlementOutcome::Pending { invoice }),
            GatewayPaymentStatus::Failed | GatewayPaymentStatus::Expired => {
                if let Some(attempt) = &attempt {
                    let reason = format!("Gateway reported the payment as {:?}", notification.status);
                    if self.db.mark_attempt_failed(attempt.id, &reason, now).await? {
                        info!("🔄️ Attempt {} on invoice {} failed", attempt.merchant_ref, invoice.invoice_number);
                    }
                }
                Ok(SettlementOutcome::AttemptFailed { invoice })
            },
        }
    }

    /// Finds the invoice a gateway reference belongs to: through the payment attempt if there is one, otherwise by
    /// treating the reference as an invoice number, which is what older integrations sent.
    async fn resolve_reference(
        &self,
        notification: &GatewayNotification,
    ) -> Result<(Invoice, Option<PaymentTransaction>), EngineError> {
        let mut attempt = self.db.fetch_attempt_by_reference(&notification.merchant_ref).await?;
        if attempt.is_none() {
            if let Some(gateway_ref) = &notification.gateway_ref {
                attempt = self.db.fetch_attempt_by_reference(gateway_ref).await?;
            }
        }
        if let Some(attempt) = attempt {
            let invoice = self
                .db
                .fetch_invoice_by_id(attempt.invoice_id)
                .await?
                .ok_or(EngineError::InvoiceIdNotFound(attempt.invoice_id))?;
            return Ok((invoice, Some(attempt)));
        }
        let number = InvoiceNumber::from(notification.merchant_ref.as_str());
        match self.db.fetch_invoice_by_number(&number).await? {
            Some(invoice) => {
                debug!("🔄️ Reference {number} matched an invoice number directly");
                Ok((invoice, None))
            },
            None => {
                warn!("🔄️ Gateway reported on unknown reference {}", notification.merchant_ref);
                Err(EngineError::ReferenceNotFound(notification.merchant_ref.clone()))
            },
        }
    }

    async fn fetch_invoice(&self, number: &InvoiceNumber) -> Result<Invoice, EngineError> {
        self.db.fetch_invoice_by_number(number).await?.ok_or_else(|| EngineError::InvoiceNotFound(number.clone()))
    }

    async fn publish_settlement(&self, outcome: &SettlementOutcome) {
        match outcome {
            SettlementOutcome::Finalized { invoice, order: Some(order) } => {
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), invoice.clone())).await;
            },
            SettlementOutcome::Finalized { invoice, order: None } => {
                let user_id = invoice.wallet_owner(None);
                let event = WalletCreditedEvent { user_id, invoice: invoice.clone(), wallet_tx: None };
                self.producers.publish_wallet_credited(event).await;
            },
            SettlementOutcome::FinalizedLate { invoice, wallet_tx } => {
                let wallet_owner =
                    wallet_tx.as_ref().map(|tx| tx.user_id.clone()).unwrap_or_else(|| invoice.wallet_owner(None));
                let event = PaymentLateEvent { invoice: invoice.clone(), wallet_owner, wallet_tx: wallet_tx.clone() };
                self.producers.publish_payment_late(event).await;
            },
            _ => {},
        }
    }
}

fn charge_request(
    invoice: &Invoice,
    attempt: &PaymentTransaction,
    order: Option<&Order>,
    method: PaymentMethod,
) -> ChargeRequest {
    let billing = order.map(|o| &o.billing_address.0);
    ChargeRequest {
        merchant_ref: attempt.merchant_ref.clone(),
        invoice_number: invoice.invoice_number.to_string(),
        amount: invoice.amount,
        method,
        customer_name: billing.map(|a| a.name.clone()).filter(|n| !n.trim().is_empty()),
        customer_email: billing.and_then(|a| a.email.clone()),
        customer_phone: billing.and_then(|a| a.phone.clone()),
        expires_at: invoice.due_date,
    }
}
