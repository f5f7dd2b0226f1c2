use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, Order, OrderItem, OrderLog, OrderStatusType, PaymentStatus, PaymentTransaction};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub user_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
    pub payment_status: Option<PaymentStatus>,
    pub limit: Option<i64>,
}

impl OrderQueryFilter {
    pub fn with_user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.payment_status.is_none()
    }
}

/// Everything there is to know about one order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub invoices: Vec<Invoice>,
    pub logs: Vec<OrderLog>,
}

impl OrderDetail {
    /// The same view with staff-only log entries removed.
    pub fn customer_view(mut self) -> Self {
        self.logs.retain(|l| l.customer_visible);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub attempts: Vec<PaymentTransaction>,
}

/// The result of asking the gateway to start a payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSession {
    pub invoice: Invoice,
    pub attempt: PaymentTransaction,
    pub redirect_url: Option<String>,
}
