//! The engine's public API surface.
//!
//! Each subsystem gets a thin API struct wrapping a [`crate::traits::SettlementDatabase`] backend:
//! [`DiscountApi`] is the discount authority, [`TrialApi`] the trial guard, and
//! [`SettlementFlowApi`] orchestrates the flow from an open payment to a finalized settlement.

pub mod discount_api;
pub mod errors;
pub mod flow_objects;
pub mod settlement_flow_api;
pub mod trial_api;

pub use discount_api::DiscountApi;
pub use errors::{DiscountError, FlowError, TrialError};
pub use flow_objects::FlowState;
pub use settlement_flow_api::SettlementFlowApi;
pub use trial_api::{TrialApi, TrialDecision};
