use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Read-only view of the ledger, scoped to exactly what the payment matcher needs: recent
/// signatures touching an account, transaction detail by signature, and the token-account lookup
/// for SPL transfers. All three calls are idempotent and side-effect-free.
#[allow(async_fn_in_trait)]
pub trait LedgerReader {
    /// The most recent transaction signatures touching `address`, newest first, at most `limit`.
    async fn recent_signatures(&self, address: &str, limit: usize) -> Result<Vec<SignatureInfo>, LedgerError>;

    /// Full transaction detail for a signature. Returns `None` if the node no longer has it.
    async fn transaction_detail(&self, signature: &str) -> Result<Option<TransactionDetail>, LedgerError>;

    /// The token account holding `mint` for `owner`, if one exists.
    async fn token_account_for_mint(&self, owner: &str, mint: &str) -> Result<Option<String>, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Could not reach the ledger endpoint: {0}")]
    Transport(String),
    #[error("The ledger endpoint returned an error: {0}")]
    Rpc(String),
    #[error("Could not decode the ledger response: {0}")]
    Decode(String),
}

//--------------------------------------    SignatureInfo    ---------------------------------------------------------
/// One entry from the recent-signatures listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    pub block_time: Option<DateTime<Utc>>,
    /// The transaction-level error, if the transaction failed. Failed transactions never satisfy
    /// a pending payment.
    pub err: Option<String>,
}

impl SignatureInfo {
    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }
}

//--------------------------------------  TransactionDetail  ---------------------------------------------------------
/// The slice of a confirmed transaction the matcher inspects: account keys and the pre/post
/// balances (native and token) around execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub signature: String,
    pub block_time: Option<DateTime<Utc>>,
    pub failed: bool,
    pub account_keys: Vec<String>,
    /// Lamport balances per account index, before and after execution.
    pub pre_balances: Vec<i64>,
    pub post_balances: Vec<i64>,
    pub pre_token_balances: Vec<TokenBalance>,
    pub post_token_balances: Vec<TokenBalance>,
}

impl TransactionDetail {
    /// The lamport delta on the given account, or `None` if the account is not in this transaction.
    pub fn lamport_delta_for(&self, address: &str) -> Option<i64> {
        let index = self.account_keys.iter().position(|k| k == address)?;
        let pre = self.pre_balances.get(index)?;
        let post = self.post_balances.get(index)?;
        Some(post - pre)
    }

    /// The token-balance delta for the given account index and mint. A missing pre (or post) entry
    /// counts as a zero balance, which is how the ledger reports freshly created token accounts.
    pub fn token_delta_for(&self, account_index: usize, mint: &str) -> i64 {
        let amount_at = |balances: &[TokenBalance]| {
            balances
                .iter()
                .find(|b| b.account_index == account_index && b.mint == mint)
                .map(|b| b.amount)
                .unwrap_or(0)
        };
        amount_at(&self.post_token_balances) - amount_at(&self.pre_token_balances)
    }
}

//--------------------------------------     TokenBalance    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub owner: Option<String>,
    /// Raw amount in the token's base units.
    pub amount: i64,
    pub decimals: u8,
}
