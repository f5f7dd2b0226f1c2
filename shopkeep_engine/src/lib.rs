//! Shopkeep Engine
//!
//! The Shopkeep Engine is the order and payment core of the Shopkeep back office. It turns checkouts into durable
//! orders, holds stock for them, reconciles their invoices against an external payment gateway and keeps a
//! double-entry ledger in step with every movement of money.
//!
//! The library is divided into three main sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend that implements them ([`SqliteDatabase`]). You should
//!    never need to access the database directly. Instead, use the public API provided by the engine. The exception
//!    is the data types used in the database. These are defined in the `db_types` module and are public.
//! 2. The engine's public API ([`OrderFlowApi`], [`ReconciliationApi`], [`SweepApi`] and friends). This is where
//!    backends, the payment gateway and the shipping provider are brought together.
//! 3. Events. The APIs publish an event after every transition that a customer or a downstream system may care about
//!    (an order was paid, a payment arrived late, a deposit was forfeited, ...). A simple hook system lets you react
//!    to them without touching the engine.
pub mod db_types;
pub mod events;
pub mod helpers;
mod ske_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ske_api::{
    invoice_api::InvoiceApi,
    ledger_api::LedgerApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    reconciliation_api::ReconciliationApi,
    settings_api::{self, SettingsApi},
    sweep_api::{SweepApi, SweepReport},
    wallet_api::WalletApi,
    DEFAULT_EXTERNAL_TIMEOUT,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    CatalogManagement,
    EngineError,
    ExpiryManagement,
    GatewayError,
    InvoiceManagement,
    LedgerError,
    LedgerManagement,
    OrderManagement,
    PaymentGateway,
    Reconciliation,
    SettingsStore,
    ShippingProvider,
    WalletManagement,
};
