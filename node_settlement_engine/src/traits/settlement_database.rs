use thiserror::Error;

use crate::db_types::{DiscountTerm, NewDiscountTerm, NewSettlement, NewTrialClaim, Settlement, TrialBlockReason, TrialClaim};

/// The durable store behind the settlement core. Backends must make two guarantees that the
/// in-memory code cannot provide on its own:
///
/// * [`try_claim_trial`](Self::try_claim_trial) is a single atomic check-and-record. Two
///   near-simultaneous claims sharing any identity key must not both succeed, so the store needs a
///   uniqueness constraint (or serializable transaction) per key. Sequential application-level
///   checks are not an acceptable implementation.
/// * [`insert_settlement`](Self::insert_settlement) is idempotent per reference. Duplicate
///   finalization attempts are no-ops that return the existing record.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Fetches a discount code by its canonical (upper-case) form.
    async fn fetch_discount_code(&self, code: &str) -> Result<Option<DiscountTerm>, SettlementDbError>;

    /// Atomically increments the usage counter of a code, failing if the cap is already reached.
    /// Returns the updated term.
    async fn redeem_discount_code(&self, code: &str) -> Result<DiscountTerm, SettlementDbError>;

    /// Stores a new discount code. Admin tooling only.
    async fn insert_discount_code(&self, term: NewDiscountTerm) -> Result<DiscountTerm, SettlementDbError>;

    /// Atomically records a trial claim, or reports which identity key blocked it.
    async fn try_claim_trial(&self, claim: NewTrialClaim) -> Result<TrialOutcome, SettlementDbError>;

    /// Idempotently stores a finalized settlement. Returns the record and `true` if it was
    /// inserted, or the pre-existing record and `false` for a duplicate reference.
    async fn insert_settlement(&self, settlement: NewSettlement) -> Result<(Settlement, bool), SettlementDbError>;

    /// Like [`insert_settlement`](Self::insert_settlement), but when the settlement is newly
    /// inserted it also consumes one usage of `code` in the same transaction. A cap failure rolls
    /// the settlement back, so a finalized record and an unredeemed code can never coexist.
    /// Duplicate references skip redemption entirely.
    async fn insert_settlement_redeeming_code(
        &self,
        settlement: NewSettlement,
        code: Option<&str>,
    ) -> Result<(Settlement, bool), SettlementDbError>;

    async fn fetch_settlement_by_reference(&self, reference: &str) -> Result<Option<Settlement>, SettlementDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementDbError> {
        Ok(())
    }
}

/// Outcome of an atomic trial claim.
#[derive(Debug, Clone)]
pub enum TrialOutcome {
    Allowed(TrialClaim),
    Blocked(TrialBlockReason),
}

#[derive(Debug, Clone, Error)]
pub enum SettlementDbError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The discount code {0} does not exist")]
    CodeNotFound(String),
    #[error("The discount code {0} has reached its usage cap")]
    CodeExhausted(String),
    #[error("A discount code {0} already exists")]
    CodeAlreadyExists(String),
    #[error("The settlement reference {0} does not exist")]
    SettlementNotFound(String),
}

impl From<sqlx::Error> for SettlementDbError {
    fn from(e: sqlx::Error) -> Self {
        SettlementDbError::DatabaseError(e.to_string())
    }
}
