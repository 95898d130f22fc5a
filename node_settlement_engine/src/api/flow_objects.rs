use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::matcher::PaymentCheck;

/// The UI-visible settlement states.
///
/// `Unmatched` checks return the flow to `AwaitingPayment` — a user-actionable retry state —
/// rather than `Failed`. `Failed` is reserved for an explicit give-up or an unrecoverable
/// validation error (for example, a discount code invalidated mid-flow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Selecting,
    AwaitingPayment,
    Settling,
    Settled,
    Failed,
}

impl FlowState {
    /// The single source of truth for legal transitions.
    pub fn can_transition_to(self, next: FlowState) -> bool {
        use FlowState::*;
        matches!(
            (self, next),
            (Selecting, AwaitingPayment)
                // zero-cost paths finalize straight from selection
                | (Selecting, Settling)
                | (Selecting, Failed)
                | (AwaitingPayment, AwaitingPayment)
                | (AwaitingPayment, Settling)
                | (AwaitingPayment, Failed)
                | (AwaitingPayment, Selecting)
                | (Settling, Settled)
                | (Settling, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FlowState::Settled | FlowState::Failed)
    }

    /// Where a payment check leaves the flow. Anything short of a full match keeps the customer in
    /// the retryable awaiting state.
    pub fn after_check(check: &PaymentCheck) -> FlowState {
        match check {
            PaymentCheck::Matched { .. } => FlowState::Settling,
            PaymentCheck::Partial { .. } | PaymentCheck::NoMatch => FlowState::AwaitingPayment,
        }
    }
}

impl Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowState::Selecting => write!(f, "Selecting"),
            FlowState::AwaitingPayment => write!(f, "AwaitingPayment"),
            FlowState::Settling => write!(f, "Settling"),
            FlowState::Settled => write!(f, "Settled"),
            FlowState::Failed => write!(f, "Failed"),
        }
    }
}
