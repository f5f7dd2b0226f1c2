//! # Shopkeep engine public API
//!
//! The `ske_api` module exposes the programmatic API of the engine. The API is modular, so that clients can pick the
//! parts they need.
//!
//! * [`order_flow_api`] drives orders through their lifecycle: checkout, point of sale, arrival of pre-ordered goods,
//!   shipping, cancellation, delivery and refunds.
//! * [`reconciliation_api`] turns payment gateway signals (push notifications, redirects and inquiries) into settled
//!   invoices, and handles wallet and manual payments.
//! * [`invoice_api`] gives access to invoices and their payment attempts, and creates wallet top-ups.
//! * [`sweep_api`] runs the time-based part of the lifecycle: expiry, reminders and deposit forfeiture.
//! * [`ledger_api`] and [`wallet_api`] are read-mostly views of the books and of customer store credit.
//! * [`settings_api`] reads runtime business settings through a short-lived cache.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use shopkeep_engine::{LedgerApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/shop.db", 25).await?;
//! // SqliteDatabase implements LedgerManagement
//! let api = LedgerApi::new(db);
//! let balance = api.trial_balance().await?;
//! assert!(balance.is_balanced());
//! ```
use std::{future::Future, time::Duration};

use log::*;

use crate::traits::GatewayError;

pub mod invoice_api;
pub mod ledger_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod reconciliation_api;
pub mod settings_api;
pub mod sweep_api;
pub mod wallet_api;

/// Upper bound on any single call to the payment gateway or the shipping provider.
pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a call to an external collaborator, giving up after `limit`.
pub(crate) async fn call_with_timeout<T, F>(what: &str, limit: Duration, call: F) -> Result<T, GatewayError>
where F: Future<Output = Result<T, GatewayError>> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("🔄️ The call to {what} did not complete within {}ms", limit.as_millis());
            Err(GatewayError::Timeout(what.to_string()))
        },
    }
}
