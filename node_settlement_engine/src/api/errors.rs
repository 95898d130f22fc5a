use thiserror::Error;

use crate::{
    db_types::{DiscountScope, TrialBlockReason},
    pricing::PricingError,
    traits::SettlementDbError,
};

/// Denials and failures from the discount authority. The message of each denial variant is the
/// authority's own wording and is surfaced to the customer verbatim.
#[derive(Debug, Clone, Error)]
pub enum DiscountError {
    #[error("That does not look like a discount code")]
    MalformedCode,
    #[error("The code {0} does not exist")]
    NotFound(String),
    #[error("The code {0} has expired")]
    Expired(String),
    #[error("The code {0} has been fully redeemed")]
    UsageCapReached(String),
    #[error("The code {code} is only valid for {required} plans")]
    ScopeMismatch { code: String, required: DiscountScope },
    #[error("Invalid discount term: {0}")]
    InvalidTerm(String),
    #[error("{0}")]
    DatabaseError(String),
}

impl From<SettlementDbError> for DiscountError {
    fn from(e: SettlementDbError) -> Self {
        match e {
            SettlementDbError::CodeNotFound(code) => DiscountError::NotFound(code),
            SettlementDbError::CodeExhausted(code) => DiscountError::UsageCapReached(code),
            e => DiscountError::DatabaseError(e.to_string()),
        }
    }
}

/// Failures from the trial guard. A *denial* is not an error: see
/// [`crate::api::TrialDecision`].
#[derive(Debug, Clone, Error)]
pub enum TrialError {
    #[error("Missing trial identity key: {0}")]
    MissingIdentityKey(&'static str),
    #[error("{0}")]
    DatabaseError(String),
}

impl From<SettlementDbError> for TrialError {
    fn from(e: SettlementDbError) -> Self {
        TrialError::DatabaseError(e.to_string())
    }
}

/// Failures from the settlement flow. Every variant is scoped to a single customer's single flow
/// attempt; nothing here is fatal to the process.
#[derive(Debug, Clone, Error)]
pub enum FlowError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Discount(#[from] DiscountError),
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error("Free trial denied. {0}")]
    TrialDenied(TrialBlockReason),
    #[error("The free trial only covers the daily term")]
    TrialRequiresDailyTerm,
    #[error("The daily term is never payable directly")]
    DailyTermNotPayable,
    #[error("The total is zero; there is nothing to pay")]
    NothingToPay,
    #[error("A zero-cost settlement requires an approved trial or a full-discount code")]
    FreePathNotApproved,
    /// Retryable: the next explicit "check payment" action simply runs the verification again.
    #[error("The ledger could not be queried: {0}. Check again in a moment.")]
    LedgerUnavailable(String),
    #[error("The payment window has closed; open a new payment to continue")]
    PaymentWindowClosed,
    #[error("Settlement misconfiguration: {0}")]
    Configuration(String),
    #[error("{0}")]
    DatabaseError(#[from] SettlementDbError),
}
