use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use shopkeep_engine::{EngineError, GatewayError, LedgerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        Self::Engine(EngineError::Ledger(e))
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine(e) => engine_status_code(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn engine_status_code(e: &EngineError) -> StatusCode {
    use EngineError::*;
    match e {
        Validation(_) | DiscountRejected(_) => StatusCode::BAD_REQUEST,
        ProductNotFound(_) |
        OrderNotFound(_) |
        OrderIdNotFound(_) |
        InvoiceNotFound(_) |
        InvoiceIdNotFound(_) |
        ReferenceNotFound(_) => StatusCode::NOT_FOUND,
        SoldOut { .. } |
        OrderNotCancellable { .. } |
        InvalidTransition { .. } |
        InvoiceAlreadyPaid(_) |
        InvoiceNotPayable { .. } |
        AmountMismatch { .. } |
        RefundExceedsPaid { .. } |
        InsufficientWalletFunds { .. } => StatusCode::CONFLICT,
        InvalidSignature => StatusCode::UNAUTHORIZED,
        SettlementContention(_) => StatusCode::SERVICE_UNAVAILABLE,
        Gateway(GatewayError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        Gateway(GatewayError::NotConfigured(_)) => StatusCode::NOT_IMPLEMENTED,
        Gateway(_) => StatusCode::BAD_GATEWAY,
        Ledger(LedgerError::Unbalanced { .. } | LedgerError::EmptyEntry | LedgerError::NegativeAmount) => {
            StatusCode::BAD_REQUEST
        },
        Ledger(LedgerError::AccountNotFound(_) | LedgerError::EntryNotFound(_)) => StatusCode::NOT_FOUND,
        Ledger(_) | InconsistentStock(..) | DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
