use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{
        InvoiceStatus,
        InvoiceType,
        Money,
        NewOrder,
        NewOrderLog,
        Order,
        OrderLog,
        OrderNumber,
        OrderStatusType,
    },
    events::{EventProducers, OrderArrivedEvent, OrderCancelledEvent, OrderPaidEvent, OrderShippedEvent},
    helpers::balance_due_days,
    order_objects::{OrderDetail, OrderQueryFilter},
    ske_api::{call_with_timeout, settings_api::SettingsApi, DEFAULT_EXTERNAL_TIMEOUT},
    traits::{
        ArrivalDetails,
        CancelOutcome,
        CatalogManagement,
        CheckoutResult,
        EngineError,
        InvoiceManagement,
        OrderManagement,
        RefundOutcome,
        SettingsStore,
        ShipOutcome,
        ShipmentBooking,
        ShipmentDetails,
        ShipmentItem,
        ShipmentRequest,
        ShipmentStatus,
        ShippingProvider,
    },
};

/// `OrderFlowApi` drives orders through their lifecycle.
///
/// Every state change is one backend transaction. Events are published once that transaction has committed, and the
/// shipping provider is only told about a cancellation after the cancellation itself is durable.
pub struct OrderFlowApi<B, S> {
    db: B,
    settings: Arc<SettingsApi<B>>,
    shipper: S,
    producers: EventProducers,
    timeout: Duration,
}

impl<B, S> Debug for OrderFlowApi<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, S> OrderFlowApi<B, S> {
    pub fn new(db: B, settings: Arc<SettingsApi<B>>, shipper: S, producers: EventProducers) -> Self {
        Self { db, settings, shipper, producers, timeout: DEFAULT_EXTERNAL_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl<B, S> OrderFlowApi<B, S>
where
    B: OrderManagement + InvoiceManagement + CatalogManagement + SettingsStore,
    S: ShippingProvider,
{
    /// Turns a checkout request into an order. Stock for every line is reserved, and the invoice(s) the customer
    /// has to pay are opened, in one transaction. A line that cannot be reserved fails the whole order with
    /// [`EngineError::SoldOut`].
    pub async fn checkout(&self, order: NewOrder) -> Result<CheckoutResult, EngineError> {
        let policy = self.settings.preorder_policy().await?;
        let result = self.db.create_order(order, policy, Utc::now()).await?;
        info!(
            "📦️ Order {} placed for {} with {} invoice(s)",
            result.order.order_number,
            result.order.total,
            result.invoices.len()
        );
        Ok(result)
    }

    /// A sale at the till. The order is paid, handed over and completed in one go.
    pub async fn point_of_sale(&self, order: NewOrder, cashier: &str) -> Result<CheckoutResult, EngineError> {
        let result = self.db.create_pos_order(order, cashier, Utc::now()).await?;
        info!("📦️ Point of sale order {} completed by {cashier}", result.order.order_number);
        if let Some(invoice) = result.invoices.iter().find(|i| i.status == InvoiceStatus::Paid) {
            self.producers.publish_order_paid(OrderPaidEvent::new(result.order.clone(), invoice.clone())).await;
        }
        Ok(result)
    }

    pub async fn fetch_order(&self, number: &OrderNumber) -> Result<Order, EngineError> {
        self.db.fetch_order_by_number(number).await?.ok_or_else(|| EngineError::OrderNotFound(number.clone()))
    }

    /// The order, with its items, invoices and full audit log.
    pub async fn order_detail(&self, number: &OrderNumber) -> Result<OrderDetail, EngineError> {
        let order = self.fetch_order(number).await?;
        let items = self.db.fetch_order_items(order.id).await?;
        let invoices = self.db.fetch_invoices_for_order(order.id).await?;
        let logs = self.db.fetch_order_logs(order.id).await?;
        Ok(OrderDetail { order, items, invoices, logs })
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, EngineError> {
        self.db.search_orders(query).await
    }

    /// Pre-ordered goods for this order have arrived. A fully paid order goes straight to `processing`; otherwise the
    /// balance invoice becomes payable, due after the product's (or the store's) balance period.
    pub async fn mark_arrived(
        &self,
        number: &OrderNumber,
        details: ArrivalDetails,
        actor: &str,
    ) -> Result<Order, EngineError> {
        let order = self.fetch_order(number).await?;
        self.arrive(order, details, actor, Utc::now()).await
    }

    /// Marks every pre-order waiting on `product_id` as arrived. Orders that cannot be moved on are logged and skipped.
    pub async fn mark_product_arrived(
        &self,
        product_id: i64,
        details: ArrivalDetails,
        actor: &str,
    ) -> Result<Vec<Order>, EngineError> {
        let waiting = self.db.fetch_orders_for_product(product_id, OrderStatusType::PreOrder).await?;
        debug!("📦️ {} pre-orders are waiting on product {product_id}", waiting.len());
        let now = Utc::now();
        let mut arrived = Vec::with_capacity(waiting.len());
        for order in waiting {
            let number = order.order_number.clone();
            match self.arrive(order, details, actor, now).await {
                Ok(o) => arrived.push(o),
                Err(e) => warn!("📦️ Could not mark order {number} as arrived. {e}"),
            }
        }
        Ok(arrived)
    }

    async fn arrive(
        &self,
        order: Order,
        details: ArrivalDetails,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, EngineError> {
        let due_date = self.balance_due_date(&order, now).await?;
        let updated = self.db.mark_arrived(order.id, details, due_date, actor, now).await?;
        let balance_invoice = self
            .db
            .fetch_invoices_for_order(order.id)
            .await?
            .into_iter()
            .find(|i| i.invoice_type == InvoiceType::Balance && i.status == InvoiceStatus::Unpaid);
        info!("📦️ Goods for order {} arrived. Order is now {}", updated.order_number, updated.status);
        self.producers.publish_order_arrived(OrderArrivedEvent { order: updated.clone(), balance_invoice }).await;
        Ok(updated)
    }

    async fn balance_due_date(&self, order: &Order, now: DateTime<Utc>) -> Result<DateTime<Utc>, EngineError> {
        let policy = self.settings.preorder_policy().await?;
        let items = self.db.fetch_order_items(order.id).await?;
        let product = match items.first() {
            Some(item) => self.db.fetch_product(item.product_id).await?,
            None => None,
        };
        let days = balance_due_days(product.as_ref().and_then(|p| p.preorder_config()), policy);
        Ok(now + chrono::Duration::days(days))
    }

    /// Books a shipment with the shipping provider and stores the shipment id and tracking number on the order.
    pub async fn book_shipment(&self, number: &OrderNumber, courier: &str, actor: &str) -> Result<Order, EngineError> {
        let order = self.fetch_order(number).await?;
        if order.status != OrderStatusType::Processing {
            return Err(EngineError::InvalidTransition {
                order: order.order_number,
                from: order.status,
                action: "book a shipment for",
            });
        }
        let items = self.db.fetch_order_items(order.id).await?;
        let request = ShipmentRequest {
            order_number: order.order_number.to_string(),
            courier: courier.to_string(),
            recipient: order.shipping_address.0.clone(),
            weight_grams: order.weight_grams,
            declared_value: order.subtotal,
            items: items.iter().map(|i| ShipmentItem { name: i.product_name.clone(), quantity: i.quantity }).collect(),
        };
        let created =
            call_with_timeout("shipping provider", self.timeout, self.shipper.create_shipment(request)).await?;
        info!("🚚️ Shipment {} booked for {} with {}", created.shipment_id, order.order_number, created.courier);
        let booking = ShipmentBooking {
            shipment_id: created.shipment_id,
            courier: created.courier,
            tracking_number: created.tracking_number,
        };
        self.db.record_shipment_booking(order.id, booking, actor).await
    }

    /// Hands the order to the courier. Revenue and cost of goods are booked the first time an order ships; shipping
    /// it again changes nothing.
    pub async fn ship(
        &self,
        number: &OrderNumber,
        details: ShipmentDetails,
        actor: &str,
    ) -> Result<ShipOutcome, EngineError> {
        let order = self.fetch_order(number).await?;
        self.ship_order(&order, details, actor).await
    }

    async fn ship_order(
        &self,
        order: &Order,
        details: ShipmentDetails,
        actor: &str,
    ) -> Result<ShipOutcome, EngineError> {
        let outcome = self.db.ship_order(order.id, details, actor, Utc::now()).await?;
        if outcome.newly_shipped {
            info!("🚚️ Order {} shipped", outcome.order.order_number);
            self.producers.publish_order_shipped(OrderShippedEvent { order: outcome.order.clone() }).await;
        }
        Ok(outcome)
    }

    /// Cancels the order and returns whatever was paid as store credit. A booked shipment is cancelled with the
    /// provider afterwards; if that fails, the cancellation still stands and the failure is logged.
    pub async fn cancel(&self, number: &OrderNumber, reason: &str, actor: &str) -> Result<CancelOutcome, EngineError> {
        let order = self.fetch_order(number).await?;
        let outcome = self.db.cancel_order(order.id, reason, actor, Utc::now()).await?;
        info!("📦️ Order {} cancelled by {actor}. {} refunded to wallet", order.order_number, outcome.refunded);
        let event = OrderCancelledEvent::new(outcome.order.clone(), outcome.refunded, outcome.forfeited);
        self.producers.publish_order_cancelled(event).await;
        if let Some(shipment_id) = &outcome.order.shipment_id {
            let cancelled = self.shipper.cancel_shipment(shipment_id);
            match call_with_timeout("shipping provider", self.timeout, cancelled).await {
                Ok(()) => debug!("🚚️ Shipment {shipment_id} cancelled"),
                Err(e) => warn!("🚚️ Could not cancel shipment {shipment_id} for {}. {e}", order.order_number),
            }
        }
        Ok(outcome)
    }

    pub async fn confirm_delivery(&self, number: &OrderNumber, actor: &str) -> Result<Order, EngineError> {
        let order = self.fetch_order(number).await?;
        let order = self.db.confirm_delivery(order.id, actor, Utc::now()).await?;
        info!("📦️ Order {} delivered", order.order_number);
        Ok(order)
    }

    /// Refunds part or all of what was paid on an order. Refunds of wallet payments go back to the wallet.
    pub async fn refund(
        &self,
        number: &OrderNumber,
        amount: Money,
        reason: &str,
        actor: &str,
    ) -> Result<RefundOutcome, EngineError> {
        let order = self.fetch_order(number).await?;
        let outcome = self.db.refund_order(order.id, amount, reason, actor, Utc::now()).await?;
        info!("📦️ Refunded {amount} on order {}. It is now {}", order.order_number, outcome.order.payment_status);
        Ok(outcome)
    }

    pub async fn add_note(
        &self,
        number: &OrderNumber,
        actor: &str,
        note: &str,
        customer_visible: bool,
    ) -> Result<OrderLog, EngineError> {
        if note.trim().is_empty() {
            return Err(EngineError::Validation("Notes cannot be empty".into()));
        }
        let order = self.fetch_order(number).await?;
        let mut log = NewOrderLog::new(actor, "note").with_note(note.trim());
        if customer_visible {
            log = log.visible();
        }
        self.db.add_order_log(order.id, log).await
    }

    /// Applies a status update from the shipping provider's webhook.
    pub async fn apply_shipment_update(&self, shipment_id: &str, status: ShipmentStatus) -> Result<Order, EngineError> {
        let order = self
            .db
            .fetch_order_by_shipment_id(shipment_id)
            .await?
            .ok_or_else(|| EngineError::ReferenceNotFound(shipment_id.to_string()))?;
        debug!("🚚️ Shipment {shipment_id} for order {} is now {status}", order.order_number);
        let actor = "shipping_provider";
        match status {
            ShipmentStatus::PickedUp | ShipmentStatus::InTransit => self.ensure_shipped(order, actor).await,
            ShipmentStatus::Delivered => {
                let order = self.ensure_shipped(order, actor).await?;
                if order.status != OrderStatusType::Shipped {
                    return Ok(order);
                }
                self.db.confirm_delivery(order.id, actor, Utc::now()).await
            },
            ShipmentStatus::Returned => {
                warn!("🚚️ Shipment {shipment_id} for order {} is being returned", order.order_number);
                let note = format!("Shipment {shipment_id} reported as returned by the courier");
                self.db.add_order_log(order.id, NewOrderLog::new(actor, "shipment_returned").with_note(note)).await?;
                Ok(order)
            },
        }
    }

    /// Ships a `processing` order the courier has picked up. Orders in any other status are only logged.
    async fn ensure_shipped(&self, order: Order, actor: &str) -> Result<Order, EngineError> {
        match order.status {
            OrderStatusType::Processing => {},
            OrderStatusType::Shipped | OrderStatusType::Completed => return Ok(order),
            status => {
                let number = &order.order_number;
                warn!("🚚️ Courier moved the parcel for {number} while the order is {status}. Not shipping it.");
                let note = format!("Courier update ignored: the order is {status}");
                let log = NewOrderLog::new(actor, "shipment_update_ignored").with_note(note);
                self.db.add_order_log(order.id, log).await?;
                return Ok(order);
            },
        }
        let courier = order.courier.clone().unwrap_or_else(|| "unknown".to_string());
        let details = ShipmentDetails { courier, tracking_number: None };
        let outcome = self.ship_order(&order, details, actor).await?;
        Ok(outcome.order)
    }
}
