use std::fmt::Display;

use node_settlement_engine::{
    db_types::{DiscountKind, DiscountScope, DiscountTerm, PendingPayment, PlanSelection, ServerClass, TokenKind},
    pricing::PriceBreakdown,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Quote   -----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub selection: PlanSelection,
    /// A discount code to apply. Validated server-side on every quote.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub referral_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub breakdown: PriceBreakdown,
    /// The canonical form of the applied code, when one survived validation.
    pub applied_code: Option<String>,
}

//----------------------------------------------   Codes   -----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
    pub server_class: ServerClass,
}

/// What the storefront gets to see about a validated code. Usage counters and expiry stay
/// server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedCode {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub scope: DiscountScope,
}

impl From<DiscountTerm> for ValidatedCode {
    fn from(term: DiscountTerm) -> Self {
        Self { code: term.code, kind: term.kind, value: term.value, scope: term.scope }
    }
}

//----------------------------------------------   Trials   ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialClaimRequest {
    pub selection: PlanSelection,
    pub operator_id: String,
    /// The client-computed device fingerprint, when available.
    #[serde(default)]
    pub device_fingerprint: Option<String>,
    /// Raw device signals for the server-side fallback fingerprint, used when the client could not
    /// compute one.
    #[serde(default)]
    pub device_signals: Vec<String>,
}

//----------------------------------------------   Payments   --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPaymentRequest {
    pub selection: PlanSelection,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub referral_active: bool,
    pub token: TokenKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPaymentResponse {
    pub pending: PendingPayment,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckPaymentRequest {
    pub pending: PendingPayment,
}

//----------------------------------------------   Settlement   ------------------------------------------------------
/// Finalization request. The server re-quotes the selection itself rather than trusting a total
/// from the client, and re-verifies `pending` against the ledger; the settlement reference is the
/// matched transaction signature, never a client-supplied string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    pub selection: PlanSelection,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub referral_active: bool,
    /// The pending payment handed out by `/payment/open`, posted back for verification.
    pub pending: PendingPayment,
}
