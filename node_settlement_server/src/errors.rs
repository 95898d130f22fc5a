use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use node_settlement_engine::{pricing::PricingError, DiscountError, FlowError, TrialError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    /// A plan selection that fails validation. Rejected before any external call.
    #[error("{0}")]
    InvalidSelection(#[from] PricingError),
    /// A denial from the discount authority, surfaced to the customer verbatim.
    #[error("{0}")]
    DiscountDenied(DiscountError),
    /// A denial from the trial guard, surfaced to the customer verbatim.
    #[error("{0}")]
    TrialDenied(String),
    /// The ledger could not be queried. The client may retry on the next explicit user action.
    #[error("{0}")]
    LedgerUnavailable(String),
    #[error("The payment window has closed; open a new payment to continue")]
    PaymentWindowClosed,
    /// The ledger answered, but no qualifying transfer was found. Settlement is refused.
    #[error("No qualifying payment was found on the ledger for this order")]
    PaymentNotMatched,
    #[error("{0}")]
    FlowDenied(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            Self::DiscountDenied(e) => match e {
                DiscountError::MalformedCode | DiscountError::InvalidTerm(_) => StatusCode::BAD_REQUEST,
                DiscountError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::FORBIDDEN,
            },
            Self::TrialDenied(_) => StatusCode::CONFLICT,
            Self::FlowDenied(_) => StatusCode::CONFLICT,
            Self::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PaymentWindowClosed => StatusCode::GONE,
            Self::PaymentNotMatched => StatusCode::PAYMENT_REQUIRED,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<DiscountError> for ServerError {
    fn from(e: DiscountError) -> Self {
        Self::DiscountDenied(e)
    }
}

impl From<TrialError> for ServerError {
    fn from(e: TrialError) -> Self {
        match e {
            TrialError::MissingIdentityKey(_) => Self::InvalidRequestBody(e.to_string()),
            TrialError::DatabaseError(m) => Self::BackendError(m),
        }
    }
}

impl From<FlowError> for ServerError {
    fn from(e: FlowError) -> Self {
        match e {
            FlowError::Pricing(p) => Self::InvalidSelection(p),
            FlowError::Discount(d) => Self::DiscountDenied(d),
            FlowError::Trial(t) => Self::from(t),
            FlowError::TrialDenied(reason) => Self::TrialDenied(reason.to_string()),
            FlowError::TrialRequiresDailyTerm | FlowError::DailyTermNotPayable | FlowError::NothingToPay => {
                Self::InvalidRequestBody(e.to_string())
            },
            FlowError::FreePathNotApproved => Self::FlowDenied(e.to_string()),
            FlowError::LedgerUnavailable(m) => Self::LedgerUnavailable(m),
            FlowError::PaymentWindowClosed => Self::PaymentWindowClosed,
            FlowError::Configuration(m) => Self::ConfigurationError(m),
            FlowError::DatabaseError(db) => Self::BackendError(db.to_string()),
        }
    }
}
