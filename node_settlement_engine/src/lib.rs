//! Node Settlement Engine
//!
//! The settlement and pricing core behind the node rental storefront. The storefront itself
//! (account management, admin panels, marketing pages) lives elsewhere; this library owns the
//! three decisions that must be correct, race-free and replay-safe:
//!
//! 1. **Pricing** ([`mod@pricing`]): a pure, deterministic quote from a combinatorial plan
//!    selection and its discount layers.
//! 2. **Payment verification** ([`mod@matcher`]): did the expected on-chain transfer (native SOL
//!    or SPL token) actually land at the receiver inside the validity window?
//! 3. **Trial gating** ([`crate::api::TrialApi`]): atomic one-shot eligibility across three
//!    independent identity keys.
//!
//! The [`mod@api`] module ties these together into the settlement flow. Storage backends implement
//! the traits in [`mod@traits`]; SQLite is the supported backend. Ledger access goes through
//! [`traits::LedgerReader`], with a JSON-RPC implementation in [`mod@rpc`] — tests substitute a
//! stub.
pub mod api;
pub mod db_types;
pub mod helpers;
pub mod matcher;
pub mod pricing;
pub mod rpc;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{DiscountApi, DiscountError, FlowError, FlowState, SettlementFlowApi, TrialApi, TrialDecision, TrialError};
pub use matcher::{MatcherError, PaymentCheck, PaymentMatcher};
pub use pricing::{PriceBreakdown, PriceEngine, PriceTable, PricingError};
pub use rpc::SolanaRpc;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{LedgerReader, SettlementDatabase};
