use chrono::Duration;
use log::*;
use nsg_common::Usd;

use crate::{
    api::{
        errors::FlowError,
        trial_api::TrialDecision,
        DiscountApi,
        TrialApi,
    },
    db_types::{
        CommitmentTerm,
        DiscountTerm,
        NewSettlement,
        NewTrialClaim,
        PendingPayment,
        PlanSelection,
        Settlement,
        SettlementKind,
        TokenKind,
    },
    matcher::{MatcherError, PaymentCheck, PaymentMatcher},
    pricing::PriceBreakdown,
    traits::{LedgerReader, SettlementDatabase, SettlementDbError},
};

/// `SettlementFlowApi` drives a plan selection from "awaiting payment" (or one of the zero-cost
/// bypass paths) to exactly one finalized settlement.
///
/// The API itself is stateless per invocation: the UI holds the [`crate::api::FlowState`], and
/// every method here corresponds to one legal transition. Finalization is keyed on the settlement
/// reference (the payment signature, or a derived trial/code reference) and is idempotent, so a
/// double-submitted "settle" is a no-op rather than a duplicate order.
pub struct SettlementFlowApi<B, L> {
    db: B,
    matcher: PaymentMatcher<L>,
}

impl<B, L> std::fmt::Debug for SettlementFlowApi<B, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementFlowApi")
    }
}

impl<B, L> SettlementFlowApi<B, L> {
    pub fn new(db: B, matcher: PaymentMatcher<L>) -> Self {
        Self { db, matcher }
    }
}

impl<B, L> SettlementFlowApi<B, L>
where
    B: SettlementDatabase,
    L: LedgerReader,
{
    /// Opens the payment step: hands back the [`PendingPayment`] the customer must satisfy.
    ///
    /// Zero totals never reach this method (they take [`Self::settle_trial`] or
    /// [`Self::settle_free_code`]), and the daily term is never payable directly.
    pub fn open_payment(
        &self,
        selection: &PlanSelection,
        breakdown: &PriceBreakdown,
        receiver_address: &str,
        token: TokenKind,
        expected_amount: i64,
        validity_window: Duration,
    ) -> Result<PendingPayment, FlowError> {
        if selection.commitment_term == CommitmentTerm::Daily {
            return Err(FlowError::DailyTermNotPayable);
        }
        if breakdown.is_free() {
            return Err(FlowError::NothingToPay);
        }
        if expected_amount <= 0 {
            return Err(FlowError::Configuration(format!("non-positive expected amount {expected_amount}")));
        }
        let pending = PendingPayment::new(receiver_address.to_string(), token, expected_amount, validity_window);
        debug!(
            "🔄️ Payment window opened: {} base units of {} to {} for the next {}s",
            expected_amount, token, receiver_address, pending.validity_window_seconds
        );
        Ok(pending)
    }

    /// One explicit "I've sent payment" verification. Ledger trouble comes back as the retryable
    /// [`FlowError::LedgerUnavailable`], never as a negative match.
    pub async fn check_payment(&self, pending: &PendingPayment) -> Result<PaymentCheck, FlowError> {
        match self.matcher.verify(pending).await {
            Ok(check) => {
                debug!("🔄️ Payment check for {}: {check:?}", pending.receiver_address);
                Ok(check)
            },
            Err(MatcherError::WindowClosed) => Err(FlowError::PaymentWindowClosed),
            Err(MatcherError::UnsupportedToken(t)) => {
                Err(FlowError::Configuration(format!("no mint configured for {t}")))
            },
            Err(MatcherError::Ledger(e)) => {
                warn!("🔄️ Ledger query failed during payment check: {e}");
                Err(FlowError::LedgerUnavailable(e.to_string()))
            },
        }
    }

    /// Finalizes a matched payment. If a discount code was applied, its usage is consumed in the
    /// same transaction that records the settlement, and only on the first finalization for this
    /// reference, so replays burn nothing.
    pub async fn settle_payment(
        &self,
        selection: &PlanSelection,
        breakdown: &PriceBreakdown,
        tx_ref: &str,
        applied_code: Option<&DiscountTerm>,
    ) -> Result<Settlement, FlowError> {
        if let Some(term) = applied_code {
            // Last line of defence: a term whose scope no longer matches the selection must never
            // reach the settlement table
            DiscountApi::new(self.db.clone()).revalidate_for_class(term, selection.server_class)?;
        }
        let settlement =
            NewSettlement::new(tx_ref.to_string(), SettlementKind::Payment, selection, breakdown.final_total);
        let code = applied_code.map(|t| t.code.as_str());
        let (record, inserted) = self.db.insert_settlement_redeeming_code(settlement, code).await.map_err(code_failure)?;
        if !inserted {
            info!("🔄️ Settlement for {tx_ref} already finalized; treating as no-op");
            return Ok(record);
        }
        info!("🔄️ Order settled against payment {tx_ref} for {}", record.final_total);
        Ok(record)
    }

    /// The free-trial path: no payment matcher involved, gated solely by the trial guard.
    pub async fn settle_trial(
        &self,
        selection: &PlanSelection,
        claim: NewTrialClaim,
    ) -> Result<Settlement, FlowError> {
        if selection.commitment_term != CommitmentTerm::Daily {
            return Err(FlowError::TrialRequiresDailyTerm);
        }
        let operator_id = claim.operator_id.clone();
        let decision = TrialApi::new(self.db.clone())
            .try_consume(&claim.operator_id, &claim.network_origin, &claim.device_fingerprint)
            .await?;
        match decision {
            TrialDecision::Denied(reason) => Err(FlowError::TrialDenied(reason)),
            TrialDecision::Allowed(_) => {
                let reference = format!("trial:{operator_id}");
                let settlement = NewSettlement::new(reference.clone(), SettlementKind::Trial, selection, Usd::default());
                let (record, inserted) = self.db.insert_settlement(settlement).await?;
                if inserted {
                    info!("🔄️ Trial order settled for operator {operator_id}");
                } else {
                    info!("🔄️ Trial settlement {reference} already finalized; treating as no-op");
                }
                Ok(record)
            },
        }
    }

    /// The 100%-discount-code path: validated by the discount authority, zero total by
    /// construction, no payment matcher involved.
    pub async fn settle_free_code(
        &self,
        selection: &PlanSelection,
        breakdown: &PriceBreakdown,
        term: &DiscountTerm,
        operator_id: &str,
    ) -> Result<Settlement, FlowError> {
        if !breakdown.is_free() {
            return Err(FlowError::FreePathNotApproved);
        }
        DiscountApi::new(self.db.clone()).revalidate_for_class(term, selection.server_class)?;
        let reference = format!("code:{}:{operator_id}", term.code);
        let settlement = NewSettlement::new(reference.clone(), SettlementKind::FreeCode, selection, Usd::default());
        let (record, inserted) =
            self.db.insert_settlement_redeeming_code(settlement, Some(&term.code)).await.map_err(code_failure)?;
        if !inserted {
            info!("🔄️ Free-code settlement {reference} already finalized; treating as no-op");
            return Ok(record);
        }
        info!("🔄️ Order settled at zero cost with code {} for operator {operator_id}", term.code);
        Ok(record)
    }
}

/// A redemption failure inside the settlement transaction is the code's fault, not the store's.
fn code_failure(e: SettlementDbError) -> FlowError {
    match e {
        SettlementDbError::CodeNotFound(_) | SettlementDbError::CodeExhausted(_) => FlowError::Discount(e.into()),
        e => FlowError::DatabaseError(e),
    }
}
