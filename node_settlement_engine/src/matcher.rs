//! The payment matcher.
//!
//! Given a [`PendingPayment`], [`PaymentMatcher::verify`] asks the ledger whether a qualifying
//! incoming transfer has landed at the receiver. Verification is driven by an explicit user action
//! ("I've sent payment"), never by background polling: each call issues one bounded chain of
//! ledger queries (list signatures, then per-signature detail) and returns. This keeps load on the
//! public query endpoint predictable and avoids reporting "unmatched" for transactions that are
//! still propagating.
//!
//! Two rules hold for every token kind:
//! * Entries older than the validity window relative to now are discarded before anything else.
//!   A stale but otherwise valid-looking transfer must never satisfy a new pending payment.
//! * A ledger-query failure is an error the caller may retry, never a negative match.

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{MintTable, PendingPayment, TokenKind},
    traits::{LedgerError, LedgerReader, SignatureInfo},
};

/// How many recent signatures are inspected per verification call.
const DEFAULT_CANDIDATE_LIMIT: usize = 10;
/// Fractional shortfall still accepted as a full match on SPL transfers. Native transfers are not
/// amount-gated at all, since network fees make exact-amount matching unreliable.
const DEFAULT_AMOUNT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Error)]
pub enum MatcherError {
    #[error("The payment window has closed; open a new payment to continue")]
    WindowClosed,
    #[error("No mint is configured for token {0}")]
    UnsupportedToken(TokenKind),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

//--------------------------------------    PaymentCheck     ---------------------------------------------------------
/// The outcome of one verification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentCheck {
    /// A qualifying transfer was detected. `received` is reported for audit; for native transfers
    /// it does not gate the match.
    Matched { tx_ref: String, received: i64 },
    /// Funds arrived but fall short of the expected amount. The customer owes exactly `remaining`.
    Partial { received: i64, remaining: i64 },
    /// Nothing qualifying yet. Not an error; the customer may retry while the window is open.
    NoMatch,
}

//--------------------------------------   PaymentMatcher    ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct PaymentMatcher<L> {
    ledger: L,
    mints: MintTable,
    candidate_limit: usize,
    amount_tolerance: f64,
}

impl<L> PaymentMatcher<L> {
    pub fn new(ledger: L, mints: MintTable) -> Self {
        Self { ledger, mints, candidate_limit: DEFAULT_CANDIDATE_LIMIT, amount_tolerance: DEFAULT_AMOUNT_TOLERANCE }
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }
}

impl<L> PaymentMatcher<L>
where L: LedgerReader
{
    /// Checks the ledger for a transfer satisfying `pending`. One bounded query chain per call.
    pub async fn verify(&self, pending: &PendingPayment) -> Result<PaymentCheck, MatcherError> {
        let now = Utc::now();
        if !pending.is_open(now) {
            debug!("🔎️ Pending payment to {} expired; no further matching", pending.receiver_address);
            return Err(MatcherError::WindowClosed);
        }
        match pending.token {
            TokenKind::Native => self.verify_native(pending).await,
            TokenKind::Usdc | TokenKind::Usdt => self.verify_token(pending).await,
        }
    }

    /// Native case: the first recent, in-window, successful transaction with a strictly positive
    /// lamport delta on the receiver wins, regardless of amount.
    async fn verify_native(&self, pending: &PendingPayment) -> Result<PaymentCheck, MatcherError> {
        let receiver = pending.receiver_address.as_str();
        let candidates = self.eligible_candidates(receiver, pending).await?;
        for info in candidates {
            let Some(tx) = self.ledger.transaction_detail(&info.signature).await? else {
                trace!("🔎️ Transaction {} has no detail available; skipping", info.signature);
                continue;
            };
            if tx.failed {
                trace!("🔎️ Transaction {} failed on-chain; skipping", tx.signature);
                continue;
            }
            match tx.lamport_delta_for(receiver) {
                Some(delta) if delta > 0 => {
                    info!("🔎️ Detected native payment of {delta} lamports to {receiver} in {}", tx.signature);
                    return Ok(PaymentCheck::Matched { tx_ref: tx.signature, received: delta });
                },
                _ => trace!("🔎️ Transaction {} did not credit {receiver}; skipping", tx.signature),
            }
        }
        debug!("🔎️ No qualifying native transfer to {receiver} yet");
        Ok(PaymentCheck::NoMatch)
    }

    /// SPL case: positive deltas across all qualifying recent transactions are summed, so split
    /// sends are supported. Meets-or-exceeds (within tolerance) is a full match; a positive
    /// shortfall is surfaced as partial with the exact remaining amount owed.
    async fn verify_token(&self, pending: &PendingPayment) -> Result<PaymentCheck, MatcherError> {
        let receiver = pending.receiver_address.as_str();
        let mint = self
            .mints
            .mint_for(pending.token)
            .ok_or(MatcherError::UnsupportedToken(pending.token))?
            .to_string();
        let Some(token_account) = self.ledger.token_account_for_mint(receiver, &mint).await? else {
            debug!("🔎️ {receiver} holds no token account for mint {mint}; nothing received yet");
            return Ok(PaymentCheck::NoMatch);
        };
        let candidates = self.eligible_candidates(&token_account, pending).await?;

        let mut total_received = 0i64;
        let mut latest_credit: Option<String> = None;
        for info in candidates {
            let Some(tx) = self.ledger.transaction_detail(&info.signature).await? else {
                continue;
            };
            if tx.failed {
                continue;
            }
            let Some(account_index) = tx.account_keys.iter().position(|k| k == &token_account) else {
                continue;
            };
            let delta = tx.token_delta_for(account_index, &mint);
            if delta > 0 {
                trace!("🔎️ Transaction {} credited {delta} base units of {mint}", tx.signature);
                total_received += delta;
                // candidates arrive newest first, so the first credit seen is the latest
                latest_credit.get_or_insert(tx.signature);
            }
        }

        let expected = pending.expected_amount;
        let acceptable = (expected as f64 * (1.0 - self.amount_tolerance)).ceil() as i64;
        match (total_received, latest_credit) {
            (received, Some(tx_ref)) if received >= acceptable => {
                info!("🔎️ Detected {} payment of {received}/{expected} to {receiver}", pending.token);
                Ok(PaymentCheck::Matched { tx_ref, received })
            },
            (received, Some(_)) if received > 0 => {
                info!("🔎️ Partial {} payment: {received} of {expected} received", pending.token);
                Ok(PaymentCheck::Partial { received, remaining: expected - received })
            },
            _ => {
                debug!("🔎️ No qualifying {} transfer to {receiver} yet", pending.token);
                Ok(PaymentCheck::NoMatch)
            },
        }
    }

    /// Lists recent signatures for `address` and applies the anti-replay window filter plus the
    /// failed-transaction filter. Entries without a block time cannot be placed in the window and
    /// are dropped.
    async fn eligible_candidates(
        &self,
        address: &str,
        pending: &PendingPayment,
    ) -> Result<Vec<SignatureInfo>, MatcherError> {
        let cutoff = pending.window_start(Utc::now());
        let signatures = self.ledger.recent_signatures(address, self.candidate_limit).await?;
        let candidates = signatures
            .into_iter()
            .filter(|s| !s.is_failed())
            .filter(|s| s.block_time.map(|t| t >= cutoff).unwrap_or(false))
            .collect::<Vec<_>>();
        trace!("🔎️ {} of last signatures for {address} fall inside the validity window", candidates.len());
        Ok(candidates)
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::{
        db_types::{MintTable, PendingPayment, TokenKind},
        traits::{LedgerError, LedgerReader, SignatureInfo, TokenBalance, TransactionDetail},
    };

    const RECEIVER: &str = "NodeShopRcvr1111111111111111111111111111111";
    const TOKEN_ACCOUNT: &str = "NodeShopUsdcAcct111111111111111111111111111";

    fn mints() -> MintTable {
        MintTable { usdc: "UsdcMint".into(), usdt: "UsdtMint".into() }
    }

    /// Canned ledger responses, newest first.
    #[derive(Default, Clone)]
    struct StubLedger {
        signatures: Vec<SignatureInfo>,
        transactions: Vec<TransactionDetail>,
        token_account: Option<String>,
        fail_listing: bool,
    }

    impl LedgerReader for StubLedger {
        async fn recent_signatures(&self, _address: &str, limit: usize) -> Result<Vec<SignatureInfo>, LedgerError> {
            if self.fail_listing {
                return Err(LedgerError::Transport("connection reset".into()));
            }
            Ok(self.signatures.iter().take(limit).cloned().collect())
        }

        async fn transaction_detail(&self, signature: &str) -> Result<Option<TransactionDetail>, LedgerError> {
            Ok(self.transactions.iter().find(|t| t.signature == signature).cloned())
        }

        async fn token_account_for_mint(&self, _owner: &str, _mint: &str) -> Result<Option<String>, LedgerError> {
            Ok(self.token_account.clone())
        }
    }

    fn pending_native(window_secs: i64) -> PendingPayment {
        PendingPayment::new(RECEIVER.into(), TokenKind::Native, 2_000_000_000, Duration::seconds(window_secs))
    }

    fn pending_usdc(expected: i64) -> PendingPayment {
        PendingPayment::new(RECEIVER.into(), TokenKind::Usdc, expected, Duration::seconds(900))
    }

    fn native_tx(signature: &str, age_secs: i64, delta: i64, failed: bool) -> (SignatureInfo, TransactionDetail) {
        let block_time = Some(Utc::now() - Duration::seconds(age_secs));
        let info = SignatureInfo { signature: signature.into(), block_time, err: failed.then(|| "custom error".into()) };
        let tx = TransactionDetail {
            signature: signature.into(),
            block_time,
            failed,
            account_keys: vec!["Sender111".into(), RECEIVER.into()],
            pre_balances: vec![5_000_000_000, 1_000_000_000],
            post_balances: vec![5_000_000_000 - delta, 1_000_000_000 + delta],
            pre_token_balances: vec![],
            post_token_balances: vec![],
        };
        (info, tx)
    }

    fn usdc_tx(signature: &str, age_secs: i64, delta: i64) -> (SignatureInfo, TransactionDetail) {
        let block_time = Some(Utc::now() - Duration::seconds(age_secs));
        let info = SignatureInfo { signature: signature.into(), block_time, err: None };
        let balance = |amount: i64| TokenBalance {
            account_index: 1,
            mint: "UsdcMint".into(),
            owner: Some(RECEIVER.into()),
            amount,
            decimals: 6,
        };
        let tx = TransactionDetail {
            signature: signature.into(),
            block_time,
            failed: false,
            account_keys: vec!["SenderAcct".into(), TOKEN_ACCOUNT.into()],
            pre_balances: vec![0, 0],
            post_balances: vec![0, 0],
            pre_token_balances: vec![balance(0)],
            post_token_balances: vec![balance(delta)],
        };
        (info, tx)
    }

    #[tokio::test]
    async fn native_positive_delta_matches_regardless_of_amount() {
        let (info, tx) = native_tx("sig-1", 30, 5_000_000, false);
        let ledger = StubLedger { signatures: vec![info], transactions: vec![tx], ..Default::default() };
        let matcher = PaymentMatcher::new(ledger, mints());
        // expected 2 SOL, received far less: still a match for native transfers
        let check = matcher.verify(&pending_native(900)).await.unwrap();
        assert_eq!(check, PaymentCheck::Matched { tx_ref: "sig-1".into(), received: 5_000_000 });
    }

    #[tokio::test]
    async fn stale_transfer_never_matches() {
        // amount-exact, but outside the 900s validity window: anti-replay filter drops it
        let (info, tx) = native_tx("sig-old", 3_600, 2_000_000_000, false);
        let ledger = StubLedger { signatures: vec![info], transactions: vec![tx], ..Default::default() };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_native(900)).await.unwrap();
        assert_eq!(check, PaymentCheck::NoMatch);
    }

    #[tokio::test]
    async fn failed_transactions_are_skipped() {
        let (bad_info, bad_tx) = native_tx("sig-failed", 10, 2_000_000_000, true);
        let (good_info, good_tx) = native_tx("sig-good", 20, 1_500_000_000, false);
        let ledger = StubLedger {
            signatures: vec![bad_info, good_info],
            transactions: vec![bad_tx, good_tx],
            ..Default::default()
        };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_native(900)).await.unwrap();
        assert_eq!(check, PaymentCheck::Matched { tx_ref: "sig-good".into(), received: 1_500_000_000 });
    }

    #[tokio::test]
    async fn debits_do_not_match() {
        let (info, tx) = native_tx("sig-debit", 30, -500_000, false);
        let ledger = StubLedger { signatures: vec![info], transactions: vec![tx], ..Default::default() };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_native(900)).await.unwrap();
        assert_eq!(check, PaymentCheck::NoMatch);
    }

    #[tokio::test]
    async fn ledger_failure_is_an_error_not_a_no_match() {
        let ledger = StubLedger { fail_listing: true, ..Default::default() };
        let matcher = PaymentMatcher::new(ledger, mints());
        let err = matcher.verify(&pending_native(900)).await.unwrap_err();
        assert!(matches!(err, MatcherError::Ledger(_)));
    }

    #[tokio::test]
    async fn closed_window_is_explicit() {
        let matcher = PaymentMatcher::new(StubLedger::default(), mints());
        let mut pending = pending_native(900);
        pending.opened_at = Utc::now() - Duration::seconds(1_000);
        let err = matcher.verify(&pending).await.unwrap_err();
        assert!(matches!(err, MatcherError::WindowClosed));
    }

    #[tokio::test]
    async fn spl_partial_payment_reports_exact_remainder() {
        // expected 100 USDC (6 decimals), received 60
        let (info, tx) = usdc_tx("sig-spl", 30, 60_000_000);
        let ledger = StubLedger {
            signatures: vec![info],
            transactions: vec![tx],
            token_account: Some(TOKEN_ACCOUNT.into()),
            ..Default::default()
        };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_usdc(100_000_000)).await.unwrap();
        assert_eq!(check, PaymentCheck::Partial { received: 60_000_000, remaining: 40_000_000 });
    }

    #[tokio::test]
    async fn spl_split_sends_sum_to_a_full_match() {
        let (info_a, tx_a) = usdc_tx("sig-a", 20, 60_000_000);
        let (info_b, tx_b) = usdc_tx("sig-b", 60, 40_000_000);
        let ledger = StubLedger {
            signatures: vec![info_a, info_b],
            transactions: vec![tx_a, tx_b],
            token_account: Some(TOKEN_ACCOUNT.into()),
            ..Default::default()
        };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_usdc(100_000_000)).await.unwrap();
        assert_eq!(check, PaymentCheck::Matched { tx_ref: "sig-a".into(), received: 100_000_000 });
    }

    #[tokio::test]
    async fn spl_tolerance_accepts_slight_shortfall() {
        // 99.5 of 100 expected: inside the 1% tolerance
        let (info, tx) = usdc_tx("sig-short", 20, 99_500_000);
        let ledger = StubLedger {
            signatures: vec![info],
            transactions: vec![tx],
            token_account: Some(TOKEN_ACCOUNT.into()),
            ..Default::default()
        };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_usdc(100_000_000)).await.unwrap();
        assert_eq!(check, PaymentCheck::Matched { tx_ref: "sig-short".into(), received: 99_500_000 });
    }

    #[tokio::test]
    async fn spl_without_token_account_is_no_match() {
        let ledger = StubLedger { token_account: None, ..Default::default() };
        let matcher = PaymentMatcher::new(ledger, mints());
        let check = matcher.verify(&pending_usdc(100_000_000)).await.unwrap();
        assert_eq!(check, PaymentCheck::NoMatch);
    }
}
