use chrono::{DateTime, Utc};

use crate::{
    db_types::{Money, NewOrder, NewOrderLog, Order, OrderItem, OrderLog, OrderNumber, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::{
        data_objects::{
            ArrivalDetails,
            CancelOutcome,
            CheckoutResult,
            PreOrderPolicy,
            RefundOutcome,
            ShipOutcome,
            ShipmentBooking,
            ShipmentDetails,
        },
        EngineError,
    },
};

/// The order state machine.
///
/// Each method is a single atomic transaction: either every effect (order row, stock, invoices, ledger, wallet, audit
/// log) is applied, or none is. Every transition writes an order log entry attributed to `actor`.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Creates an order from a checkout.
    ///
    /// * Reserves stock for every line with a conditional update. If any line cannot be reserved the whole order is
    ///   rejected with [`EngineError::SoldOut`].
    /// * Computes the totals from catalog prices and re-validates the discount code.
    /// * Opens a `full` invoice, or for pre-orders a `deposit` invoice and a dormant `balance` invoice.
    async fn create_order(
        &self,
        order: NewOrder,
        policy: PreOrderPolicy,
        now: DateTime<Utc>,
    ) -> Result<CheckoutResult, EngineError>;

    /// Records a point-of-sale transaction. Stock is deducted and the full invoice is paid in the same transaction.
    async fn create_pos_order(
        &self,
        order: NewOrder,
        cashier: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckoutResult, EngineError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, EngineError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, EngineError>;

    async fn fetch_order_by_shipment_id(&self, shipment_id: &str) -> Result<Option<Order>, EngineError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, EngineError>;

    async fn fetch_order_logs(&self, order_id: i64) -> Result<Vec<OrderLog>, EngineError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, EngineError>;

    /// Orders in the given status that contain the product.
    async fn fetch_orders_for_product(
        &self,
        product_id: i64,
        status: OrderStatusType,
    ) -> Result<Vec<Order>, EngineError>;

    /// The goods for a pre-order have arrived.
    ///
    /// A fully paid order moves to `processing`. Otherwise the balance invoice is activated with the given due date,
    /// the shipping cost is optionally re-quoted, and the order moves to `payment_due`.
    async fn mark_arrived(
        &self,
        order_id: i64,
        details: ArrivalDetails,
        due_date: DateTime<Utc>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, EngineError>;

    /// Stores the result of booking a shipment with the shipping provider.
    async fn record_shipment_booking(
        &self,
        order_id: i64,
        booking: ShipmentBooking,
        actor: &str,
    ) -> Result<Order, EngineError>;

    /// Marks the order as shipped. Revenue recognition and COGS entries are posted exactly once per order.
    async fn ship_order(
        &self,
        order_id: i64,
        details: ShipmentDetails,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ShipOutcome, EngineError>;

    /// Cancels an order that has not shipped yet. Held stock is released (or restocked, if already deducted) and any
    /// amount paid is returned as wallet credit.
    async fn cancel_order(
        &self,
        order_id: i64,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome, EngineError>;

    /// `shipped → completed`. Calling it on a completed order is a no-op.
    async fn confirm_delivery(&self, order_id: i64, actor: &str, now: DateTime<Utc>) -> Result<Order, EngineError>;

    /// Refunds part or all of what was paid for an order. Orders paid from a wallet are refunded to the wallet.
    async fn refund_order(
        &self,
        order_id: i64,
        amount: Money,
        reason: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<RefundOutcome, EngineError>;

    async fn add_order_log(&self, order_id: i64, log: NewOrderLog) -> Result<OrderLog, EngineError>;
}
