//! # Backend contracts
//!
//! The traits in this module define what a storage backend must provide for the engine to run on it.
//! [`crate::SqliteDatabase`] is the implementation that ships with the engine.
//!
//! * [`OrderManagement`] owns the order state machine: checkout, arrival, shipping, cancellation and refunds.
//! * [`InvoiceManagement`] holds invoices and the payment attempts made against them.
//! * [`Reconciliation`] is the one place an invoice becomes paid.
//! * [`LedgerManagement`] is the double-entry ledger.
//! * [`ExpiryManagement`] holds the time-based transitions driven by the sweep.
//! * [`CatalogManagement`], [`WalletManagement`] and [`SettingsStore`] cover the supporting records.
//!
//! [`PaymentGateway`] and [`ShippingProvider`] are not backends. They are the seams to the external collaborators.
mod catalog_management;
mod errors;
mod expiry_management;
mod gateway;
mod invoice_management;
mod ledger_management;
mod order_management;
mod reconciliation;
mod settings;
mod wallet_management;

pub mod data_objects;

pub use catalog_management::CatalogManagement;
pub use data_objects::{
    AccountPurpose,
    ArrivalDetails,
    CancelOutcome,
    CheckoutResult,
    ExpiredInvoice,
    ForfeitOutcome,
    PreOrderPolicy,
    RefundOutcome,
    SettlementOutcome,
    SettlementRequest,
    ShipOutcome,
    ShipmentBooking,
    ShipmentDetails,
    TrialBalance,
};
pub use errors::{EngineError, GatewayError, LedgerError};
pub use expiry_management::ExpiryManagement;
pub use gateway::{
    ChargeRequest,
    ChargeResponse,
    GatewayNotification,
    GatewayPaymentStatus,
    ManualShipping,
    PaymentGateway,
    ShipmentCreated,
    ShipmentItem,
    ShipmentRequest,
    ShipmentStatus,
    ShippingProvider,
};
pub use invoice_management::InvoiceManagement;
pub use ledger_management::LedgerManagement;
pub use order_management::OrderManagement;
pub use reconciliation::Reconciliation;
pub use settings::SettingsStore;
pub use wallet_management::WalletManagement;
