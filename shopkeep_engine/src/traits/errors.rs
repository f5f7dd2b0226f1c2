use thiserror::Error;

use crate::{
    db_types::{InvoiceNumber, InvoiceStatus, Money, OrderNumber, OrderStatusType},
    traits::data_objects::AccountPurpose,
};

/// The error type returned by the engine's backends and public APIs.
///
/// Business rule violations are reported before any state is changed. Running into a guarded update that has already
/// been applied is *not* an error; see [`crate::traits::SettlementOutcome`].
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    Validation(String),
    #[error("Product {product_id} is sold out. Requested {requested}, but only {available} available.")]
    SoldOut { product_id: i64, requested: i64, available: i64 },
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested invoice {0} does not exist")]
    InvoiceNotFound(InvoiceNumber),
    #[error("The requested invoice (internal id {0}) does not exist")]
    InvoiceIdNotFound(i64),
    #[error("No payment attempt or invoice matches the reference {0}")]
    ReferenceNotFound(String),
    #[error("Order {order} cannot be cancelled while it is {status}")]
    OrderNotCancellable { order: OrderNumber, status: OrderStatusType },
    #[error("Order {order} cannot move from {from} via '{action}'")]
    InvalidTransition { order: OrderNumber, from: OrderStatusType, action: &'static str },
    #[error("Invoice {0} has already been paid")]
    InvoiceAlreadyPaid(InvoiceNumber),
    #[error("Invoice {invoice} is {status} and cannot be paid")]
    InvoiceNotPayable { invoice: InvoiceNumber, status: InvoiceStatus },
    #[error("Settlement of {received} does not match the {expected} due on invoice {invoice}")]
    AmountMismatch { invoice: InvoiceNumber, expected: Money, received: Money },
    #[error("Cannot refund {requested}. Only {refundable} of order {order} is refundable.")]
    RefundExceedsPaid { order: OrderNumber, requested: Money, refundable: Money },
    #[error("Wallet for {user_id} holds {balance}, which does not cover {requested}")]
    InsufficientWalletFunds { user_id: String, balance: Money, requested: Money },
    #[error("Discount code rejected. {0}")]
    DiscountRejected(String),
    #[error("Invoice {0} was modified concurrently too many times. Try again later.")]
    SettlementContention(InvoiceNumber),
    #[error("Stock bookkeeping for order {0} is inconsistent: {1}")]
    InconsistentStock(OrderNumber, String),
    #[error("The notification signature is invalid")]
    InvalidSignature,
    #[error("{0}")]
    Ledger(#[from] LedgerError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::DatabaseError(e.to_string())
    }
}

impl EngineError {
    /// True for errors caused by the caller's request rather than a fault in the engine or its collaborators.
    pub fn is_business_rule(&self) -> bool {
        !matches!(
            self,
            EngineError::DatabaseError(_)
                | EngineError::Gateway(_)
                | EngineError::Ledger(_)
                | EngineError::InconsistentStock(..)
                | EngineError::SettlementContention(_)
        )
    }
}

/// Errors raised while posting to the ledger. An entry that fails validation is never persisted.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Journal entry does not balance: debits {debit}, credits {credit}")]
    Unbalanced { debit: Money, credit: Money },
    #[error("Journal entry has no lines with a non-zero amount")]
    EmptyEntry,
    #[error("Journal lines cannot carry negative amounts, or both a debit and a credit")]
    NegativeAmount,
    #[error("No account could be resolved for {0:?}. Check the chart of accounts.")]
    AccountNotResolved(AccountPurpose),
    #[error("Account {0} does not exist")]
    AccountNotFound(i64),
    #[error("Journal entry {0} does not exist")]
    EntryNotFound(i64),
    #[error("Ledger database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Failures talking to the payment gateway or the shipping provider. Local state is left untouched when these occur.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The call to {0} timed out")]
    Timeout(String),
    #[error("Could not reach {0}")]
    Unreachable(String),
    #[error("Unexpected response status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
    #[error("Could not make sense of the response. {0}")]
    MalformedResponse(String),
    #[error("The request was rejected. {0}")]
    Rejected(String),
    #[error("No {0} has been configured")]
    NotConfigured(String),
}
