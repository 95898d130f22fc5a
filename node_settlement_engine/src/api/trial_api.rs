use log::*;

use crate::{
    api::errors::TrialError,
    db_types::{NewTrialClaim, TrialBlockReason, TrialClaim},
    traits::{SettlementDatabase, TrialOutcome},
};

/// Outcome of a trial eligibility check. A denial carries the first identity key that blocked it,
/// in check order: operator account, then network origin, then device.
#[derive(Debug, Clone)]
pub enum TrialDecision {
    Allowed(TrialClaim),
    Denied(TrialBlockReason),
}

impl TrialDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TrialDecision::Allowed(_))
    }
}

/// The trial guard.
///
/// This API is reachable from a public, unauthenticated entry point, and two near-simultaneous
/// requests from the same blocked identity are a realistic adversarial pattern. The decision is
/// therefore delegated to the backend as one conditional insert against per-key uniqueness
/// constraints ([`SettlementDatabase::try_claim_trial`]); this API never does check-then-insert
/// itself.
#[derive(Debug, Clone)]
pub struct TrialApi<B> {
    db: B,
}

impl<B> TrialApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> TrialApi<B>
where B: SettlementDatabase
{
    /// Atomically decides first-use eligibility and records consumption.
    pub async fn try_consume(
        &self,
        operator_id: &str,
        network_origin: &str,
        device_fingerprint: &str,
    ) -> Result<TrialDecision, TrialError> {
        if operator_id.trim().is_empty() {
            return Err(TrialError::MissingIdentityKey("operator account identifier"));
        }
        if network_origin.trim().is_empty() {
            return Err(TrialError::MissingIdentityKey("network origin"));
        }
        if device_fingerprint.trim().is_empty() {
            return Err(TrialError::MissingIdentityKey("device fingerprint"));
        }
        let claim = NewTrialClaim {
            operator_id: operator_id.trim().to_string(),
            network_origin: network_origin.trim().to_string(),
            device_fingerprint: device_fingerprint.trim().to_string(),
        };
        match self.db.try_claim_trial(claim).await? {
            TrialOutcome::Allowed(claim) => {
                info!("🎟️ Trial consumed by operator {}", claim.operator_id);
                Ok(TrialDecision::Allowed(claim))
            },
            TrialOutcome::Blocked(reason) => {
                info!("🎟️ Trial denied ({reason:?}) for operator {operator_id}");
                Ok(TrialDecision::Denied(reason))
            },
        }
    }
}
