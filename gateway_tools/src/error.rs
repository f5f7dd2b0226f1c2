use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PayGateError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The payment gateway did not answer in time")]
    Timeout,
    #[error("Could not reach the payment gateway: {0}")]
    Unreachable(String),
    #[error("Gateway request failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Gateway response is missing '{0}'")]
    MissingField(&'static str),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown transaction status: {0}")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Error)]
pub enum ShipperError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The shipping provider did not answer in time")]
    Timeout,
    #[error("Could not reach the shipping provider: {0}")]
    Unreachable(String),
    #[error("Shipping request failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Shipping response is missing '{0}'")]
    MissingField(&'static str),
    #[error("The shipping provider refused the request. {0}")]
    Refused(String),
}

/// Failures common to both clients. Each client converts these into its own error type.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    #[error("timeout")]
    Timeout,
    #[error("{0}")]
    Unreachable(String),
    #[error("Error {status}. {message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Json(String),
}

impl From<reqwest::Error> for RestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RestError::Timeout
        } else if e.is_decode() {
            RestError::Json(e.to_string())
        } else {
            RestError::Unreachable(e.to_string())
        }
    }
}

impl From<RestError> for PayGateError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::Timeout => PayGateError::Timeout,
            RestError::Unreachable(s) => PayGateError::Unreachable(s),
            RestError::Status { status, message } => PayGateError::QueryError { status, message },
            RestError::Json(s) => PayGateError::JsonError(s),
        }
    }
}

impl From<RestError> for ShipperError {
    fn from(e: RestError) -> Self {
        match e {
            RestError::Timeout => ShipperError::Timeout,
            RestError::Unreachable(s) => ShipperError::Unreachable(s),
            RestError::Status { status, message } => ShipperError::QueryError { status, message },
            RestError::Json(s) => ShipperError::JsonError(s),
        }
    }
}
