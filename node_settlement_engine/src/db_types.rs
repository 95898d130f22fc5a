use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use log::error;
use nsg_common::Usd;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------    ServerClass     ----------------------------------------------------------
/// The class of node being rented. Shared nodes have a single fixed monthly price; dedicated nodes
/// are priced per hardware tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerClass {
    Shared,
    Dedicated,
}

impl Display for ServerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerClass::Shared => write!(f, "Shared"),
            ServerClass::Dedicated => write!(f, "Dedicated"),
        }
    }
}

impl FromStr for ServerClass {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "dedicated" => Ok(Self::Dedicated),
            s => Err(ConversionError(format!("Invalid server class: {s}"))),
        }
    }
}

//--------------------------------------   CommitmentTerm   ----------------------------------------------------------
/// The billing period a customer commits to. Longer terms carry a scheduled discount on the server
/// price (never on add-ons). `Daily` is the trial term: it is only reachable through a redeemed
/// trial and is never payable directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentTerm {
    Daily,
    Monthly,
    ThreeMonth,
    SixMonth,
    OneYear,
}

impl CommitmentTerm {
    /// The scheduled discount fraction for this term.
    pub fn discount_rate(&self) -> f64 {
        match self {
            CommitmentTerm::Daily | CommitmentTerm::Monthly => 0.0,
            CommitmentTerm::ThreeMonth => 0.08,
            CommitmentTerm::SixMonth => 0.12,
            CommitmentTerm::OneYear => 0.20,
        }
    }

    pub fn has_discount(&self) -> bool {
        self.discount_rate() > 0.0
    }
}

impl Display for CommitmentTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitmentTerm::Daily => write!(f, "Daily"),
            CommitmentTerm::Monthly => write!(f, "Monthly"),
            CommitmentTerm::ThreeMonth => write!(f, "3 months"),
            CommitmentTerm::SixMonth => write!(f, "6 months"),
            CommitmentTerm::OneYear => write!(f, "1 year"),
        }
    }
}

//--------------------------------------    HardwareTier    ----------------------------------------------------------
/// A lightweight wrapper around the identifier of a dedicated hardware tier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct HardwareTier(pub String);

impl Display for HardwareTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for HardwareTier {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl HardwareTier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    PlanSelection    ---------------------------------------------------------
/// Everything the customer has picked on the plan configurator. This is the sole input to the
/// price engine besides the discount layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSelection {
    pub server_class: ServerClass,
    pub commitment_term: CommitmentTerm,
    /// Required for dedicated servers; meaningless for shared ones.
    #[serde(default)]
    pub hardware_tier: Option<HardwareTier>,
    /// Required for dedicated servers; meaningless for shared ones.
    #[serde(default)]
    pub location: Option<String>,
    /// Extra stake allocation packages. Dedicated only, capped at [`PlanSelection::MAX_STAKE_PACKAGES`].
    #[serde(default)]
    pub stake_packages: u8,
    /// Shred-stream access add-on. Dedicated only.
    #[serde(default)]
    pub shreds_addon: bool,
    /// Whether the rent-sharing surcharge applies to this plan.
    #[serde(default)]
    pub rent_sharing: bool,
}

impl PlanSelection {
    pub const MAX_STAKE_PACKAGES: u8 = 10;

    pub fn shared(commitment_term: CommitmentTerm) -> Self {
        Self {
            server_class: ServerClass::Shared,
            commitment_term,
            hardware_tier: None,
            location: None,
            stake_packages: 0,
            shreds_addon: false,
            rent_sharing: false,
        }
    }

    pub fn dedicated<T: Into<HardwareTier>>(commitment_term: CommitmentTerm, tier: T, location: &str) -> Self {
        Self {
            server_class: ServerClass::Dedicated,
            commitment_term,
            hardware_tier: Some(tier.into()),
            location: Some(location.to_string()),
            stake_packages: 0,
            shreds_addon: false,
            rent_sharing: false,
        }
    }

    pub fn with_stake_packages(mut self, n: u8) -> Self {
        self.stake_packages = n;
        self
    }

    pub fn with_shreds(mut self) -> Self {
        self.shreds_addon = true;
        self
    }

    pub fn with_rent_sharing(mut self) -> Self {
        self.rent_sharing = true;
        self
    }

    pub fn has_addons(&self) -> bool {
        self.stake_packages > 0 || self.shreds_addon
    }
}

//--------------------------------------    DiscountKind     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Flat,
}

impl Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountKind::Percentage => write!(f, "Percentage"),
            DiscountKind::Flat => write!(f, "Flat"),
        }
    }
}

impl From<String> for DiscountKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "percentage" => Self::Percentage,
            "flat" => Self::Flat,
            _ => {
                error!("Invalid discount kind: {value}. But this conversion cannot fail. Defaulting to Flat");
                Self::Flat
            },
        }
    }
}

//--------------------------------------    DiscountScope    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountScope {
    Shared,
    Dedicated,
    Both,
}

impl DiscountScope {
    pub fn covers(&self, class: ServerClass) -> bool {
        match self {
            DiscountScope::Both => true,
            DiscountScope::Shared => class == ServerClass::Shared,
            DiscountScope::Dedicated => class == ServerClass::Dedicated,
        }
    }
}

impl Display for DiscountScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountScope::Shared => write!(f, "Shared"),
            DiscountScope::Dedicated => write!(f, "Dedicated"),
            DiscountScope::Both => write!(f, "Both"),
        }
    }
}

impl From<String> for DiscountScope {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "shared" => Self::Shared,
            "dedicated" => Self::Dedicated,
            "both" => Self::Both,
            _ => {
                error!("Invalid discount scope: {value}. But this conversion cannot fail. Defaulting to Both");
                Self::Both
            },
        }
    }
}

//--------------------------------------    DiscountTerm     ---------------------------------------------------------
/// A discount code as stored by the discount authority.
///
/// `value` is interpreted per `kind`: percentage points in (0, 100] for `Percentage`, whole dollars
/// for `Flat`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscountTerm {
    pub id: i64,
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub scope: DiscountScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_cap: Option<i64>,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscountTerm {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t <= now).unwrap_or(false)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_cap.map(|cap| self.usage_count >= cap).unwrap_or(false)
    }

    /// A term is active iff it has not expired, has usages left, and its scope covers the plan.
    pub fn is_active_for(&self, class: ServerClass, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.is_exhausted() && self.scope.covers(class)
    }

    /// Whether applying this code necessarily zeroes the server charge (a 100% code).
    pub fn is_full_discount(&self) -> bool {
        self.kind == DiscountKind::Percentage && self.value >= 100
    }

    /// The discount amount this term yields against the given discountable base. Percentage codes
    /// round to whole dollars; flat codes are capped at the base so no negative residue is possible.
    pub fn discount_against(&self, discountable: Usd) -> Usd {
        match self.kind {
            DiscountKind::Percentage => discountable.percent_to_dollar(self.value),
            DiscountKind::Flat => Usd::from_dollars(self.value).min(discountable),
        }
    }
}

//--------------------------------------   NewDiscountTerm   ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscountTerm {
    pub code: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub scope: DiscountScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_cap: Option<i64>,
}

impl NewDiscountTerm {
    pub fn percentage(code: &str, value: i64, scope: DiscountScope) -> Self {
        Self { code: canonical_code(code), kind: DiscountKind::Percentage, value, scope, expires_at: None, usage_cap: None }
    }

    pub fn flat(code: &str, dollars: i64, scope: DiscountScope) -> Self {
        Self { code: canonical_code(code), kind: DiscountKind::Flat, value: dollars, scope, expires_at: None, usage_cap: None }
    }

    pub fn expiring_at(mut self, t: DateTime<Utc>) -> Self {
        self.expires_at = Some(t);
        self
    }

    pub fn capped_at(mut self, cap: i64) -> Self {
        self.usage_cap = Some(cap);
        self
    }
}

/// Codes are case-insensitive on entry and canonicalized to upper-case everywhere else.
pub fn canonical_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

//--------------------------------------      TokenKind      ---------------------------------------------------------
/// The token the customer pays with. Native SOL transfers are matched on lamport balance deltas;
/// the two SPL kinds are matched on token-account balance deltas and share one mint-lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Native,
    Usdc,
    Usdt,
}

impl TokenKind {
    pub fn is_native(&self) -> bool {
        *self == TokenKind::Native
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Native => write!(f, "SOL"),
            TokenKind::Usdc => write!(f, "USDC"),
            TokenKind::Usdt => write!(f, "USDT"),
        }
    }
}

//--------------------------------------     MintTable       ---------------------------------------------------------
/// The mint-lookup table shared by the SPL token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintTable {
    pub usdc: String,
    pub usdt: String,
}

impl MintTable {
    /// Mainnet mints.
    pub fn mainnet() -> Self {
        Self {
            usdc: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            usdt: "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB".to_string(),
        }
    }

    pub fn mint_for(&self, token: TokenKind) -> Option<&str> {
        match token {
            TokenKind::Native => None,
            TokenKind::Usdc => Some(self.usdc.as_str()),
            TokenKind::Usdt => Some(self.usdt.as_str()),
        }
    }
}

//--------------------------------------   PendingPayment    ---------------------------------------------------------
/// An expected incoming transfer, created when the settlement flow opens the payment step.
///
/// The record lives for the duration of the session only: it is consumed on the first detected
/// match or on explicit cancel, and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    pub receiver_address: String,
    pub token: TokenKind,
    /// Expected amount in base units of the token (lamports for native transfers).
    pub expected_amount: i64,
    pub opened_at: DateTime<Utc>,
    pub validity_window_seconds: i64,
}

impl PendingPayment {
    pub fn new(receiver_address: String, token: TokenKind, expected_amount: i64, window: Duration) -> Self {
        Self {
            receiver_address,
            token,
            expected_amount,
            opened_at: Utc::now(),
            validity_window_seconds: window.num_seconds(),
        }
    }

    /// The earliest ledger timestamp still eligible to satisfy this payment. Anything older is
    /// treated as replay and ignored, no matter how well it matches otherwise.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.validity_window_seconds)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.opened_at + Duration::seconds(self.validity_window_seconds)
    }
}

//--------------------------------------     TrialClaim      ---------------------------------------------------------
/// A consumed free trial. Append-only: the mere existence of a record matching *any one* of the
/// three identity keys blocks a new trial.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TrialClaim {
    pub id: i64,
    pub operator_id: String,
    pub network_origin: String,
    pub device_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrialClaim {
    pub operator_id: String,
    pub network_origin: String,
    pub device_fingerprint: String,
}

//--------------------------------------  TrialBlockReason   ---------------------------------------------------------
/// Which identity key blocked a trial claim. The checks run in this order, so only the first
/// matching key is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialBlockReason {
    Identity,
    Origin,
    Device,
}

impl Display for TrialBlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialBlockReason::Identity => write!(f, "A trial has already been used by this account"),
            TrialBlockReason::Origin => write!(f, "A trial has already been used from this network address"),
            TrialBlockReason::Device => write!(f, "A trial has already been used on this device"),
        }
    }
}

//--------------------------------------   SettlementKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    /// Settled against a detected on-chain payment.
    Payment,
    /// Settled through the free-trial path.
    Trial,
    /// Settled through a 100%-discount code.
    FreeCode,
}

impl Display for SettlementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementKind::Payment => write!(f, "Payment"),
            SettlementKind::Trial => write!(f, "Trial"),
            SettlementKind::FreeCode => write!(f, "FreeCode"),
        }
    }
}

impl From<String> for SettlementKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Payment" => Self::Payment,
            "Trial" => Self::Trial,
            "FreeCode" => Self::FreeCode,
            _ => {
                error!("Invalid settlement kind: {value}. But this conversion cannot fail. Defaulting to Payment");
                Self::Payment
            },
        }
    }
}

//--------------------------------------     Settlement      ---------------------------------------------------------
/// A finalized order as handed off to order persistence. Exactly one settlement may exist per
/// reference; duplicate finalization attempts are no-ops.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    /// The payment transaction signature, or a derived trial/code reference.
    pub reference: String,
    pub kind: SettlementKind,
    /// The plan selection, serialized as JSON for the order record.
    pub plan: String,
    pub final_total: Usd,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSettlement {
    pub reference: String,
    pub kind: SettlementKind,
    pub plan: String,
    pub final_total: Usd,
}

impl NewSettlement {
    pub fn new(reference: String, kind: SettlementKind, selection: &PlanSelection, final_total: Usd) -> Self {
        let plan = serde_json::to_string(selection).unwrap_or_else(|e| {
            error!("Could not serialize plan selection: {e}");
            String::from("{}")
        });
        Self { reference, kind, plan, final_total }
    }
}
