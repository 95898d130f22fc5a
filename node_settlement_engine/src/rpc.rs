//! JSON-RPC implementation of [`LedgerReader`] against a public Solana query endpoint.
//!
//! Only three read-only methods are used: `getSignaturesForAddress`, `getTransaction` and
//! `getTokenAccountsByOwner`. All are idempotent and side-effect-free, which is what lets the
//! matcher retry freely on explicit user action.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::traits::{LedgerError, LedgerReader, SignatureInfo, TokenBalance, TransactionDetail};

#[derive(Clone)]
pub struct SolanaRpc {
    url: String,
    commitment: String,
    client: Arc<Client>,
}

impl SolanaRpc {
    pub fn new(url: &str) -> Result<Self, LedgerError> {
        let client = Client::builder().build().map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self { url: url.to_string(), commitment: "confirmed".to_string(), client: Arc::new(client) })
    }

    pub fn with_commitment(mut self, commitment: &str) -> Self {
        self.commitment = commitment.to_string();
        self
    }

    async fn rpc_call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        trace!("Sending RPC query {method}");
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| LedgerError::Transport(e.to_string()))?;
            return Err(LedgerError::Rpc(format!("{method} returned HTTP {status}: {message}")));
        }
        let envelope = response.json::<Value>().await.map_err(|e| LedgerError::Decode(e.to_string()))?;
        if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
            return Err(LedgerError::Rpc(format!("{method} failed: {err}")));
        }
        let result = envelope
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Decode(format!("{method} response carried no result")))?;
        serde_json::from_value(result).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

impl LedgerReader for SolanaRpc {
    async fn recent_signatures(&self, address: &str, limit: usize) -> Result<Vec<SignatureInfo>, LedgerError> {
        let params = json!([address, { "limit": limit, "commitment": self.commitment }]);
        let entries: Vec<RpcSignature> = self.rpc_call("getSignaturesForAddress", params).await?;
        debug!("Fetched {} recent signatures for {address}", entries.len());
        Ok(entries.into_iter().map(SignatureInfo::from).collect())
    }

    async fn transaction_detail(&self, signature: &str) -> Result<Option<TransactionDetail>, LedgerError> {
        let params = json!([signature, {
            "encoding": "json",
            "commitment": self.commitment,
            "maxSupportedTransactionVersion": 0,
        }]);
        let tx: Option<RpcTransaction> = self.rpc_call("getTransaction", params).await?;
        Ok(tx.map(|t| t.into_detail(signature)))
    }

    async fn token_account_for_mint(&self, owner: &str, mint: &str) -> Result<Option<String>, LedgerError> {
        let params = json!([owner, { "mint": mint }, { "encoding": "jsonParsed", "commitment": self.commitment }]);
        let accounts: RpcTokenAccounts = self.rpc_call("getTokenAccountsByOwner", params).await?;
        Ok(accounts.value.into_iter().next().map(|a| a.pubkey))
    }
}

//--------------------------------------    wire objects     ---------------------------------------------------------

fn block_time_to_utc(block_time: Option<i64>) -> Option<DateTime<Utc>> {
    block_time.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignature {
    signature: String,
    block_time: Option<i64>,
    err: Option<Value>,
}

impl From<RpcSignature> for SignatureInfo {
    fn from(s: RpcSignature) -> Self {
        SignatureInfo {
            signature: s.signature,
            block_time: block_time_to_utc(s.block_time),
            err: s.err.filter(|e| !e.is_null()).map(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    block_time: Option<i64>,
    meta: RpcTransactionMeta,
    transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMeta {
    err: Option<Value>,
    pre_balances: Vec<i64>,
    post_balances: Vec<i64>,
    #[serde(default)]
    pre_token_balances: Vec<RpcTokenBalance>,
    #[serde(default)]
    post_token_balances: Vec<RpcTokenBalance>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcTransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransactionMessage {
    account_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    account_index: usize,
    mint: String,
    owner: Option<String>,
    ui_token_amount: RpcUiTokenAmount,
}

#[derive(Debug, Deserialize)]
struct RpcUiTokenAmount {
    amount: String,
    decimals: u8,
}

impl From<RpcTokenBalance> for TokenBalance {
    fn from(b: RpcTokenBalance) -> Self {
        let amount = b.ui_token_amount.amount.parse::<i64>().unwrap_or_else(|e| {
            error!("Unparseable token amount '{}' in ledger response: {e}", b.ui_token_amount.amount);
            0
        });
        TokenBalance {
            account_index: b.account_index,
            mint: b.mint,
            owner: b.owner,
            amount,
            decimals: b.ui_token_amount.decimals,
        }
    }
}

impl RpcTransaction {
    fn into_detail(self, signature: &str) -> TransactionDetail {
        TransactionDetail {
            signature: signature.to_string(),
            block_time: block_time_to_utc(self.block_time),
            failed: self.meta.err.as_ref().map(|e| !e.is_null()).unwrap_or(false),
            account_keys: self.transaction.message.account_keys,
            pre_balances: self.meta.pre_balances,
            post_balances: self.meta.post_balances,
            pre_token_balances: self.meta.pre_token_balances.into_iter().map(TokenBalance::from).collect(),
            post_token_balances: self.meta.post_token_balances.into_iter().map(TokenBalance::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcTokenAccounts {
    value: Vec<RpcKeyedAccount>,
}

#[derive(Debug, Deserialize)]
struct RpcKeyedAccount {
    pubkey: String,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn signature_listing_decodes() {
        let raw = json!([
            { "signature": "sig-1", "slot": 100, "blockTime": 1_700_000_000, "err": null },
            { "signature": "sig-2", "slot": 99, "blockTime": null, "err": { "InstructionError": [0, "Custom"] } }
        ]);
        let entries: Vec<RpcSignature> = serde_json::from_value(raw).unwrap();
        let infos = entries.into_iter().map(SignatureInfo::from).collect::<Vec<_>>();
        assert_eq!(infos[0].signature, "sig-1");
        assert!(!infos[0].is_failed());
        assert!(infos[0].block_time.is_some());
        assert!(infos[1].is_failed());
        assert!(infos[1].block_time.is_none());
    }

    #[test]
    fn transaction_decodes_to_detail() {
        let raw = json!({
            "blockTime": 1_700_000_000,
            "meta": {
                "err": null,
                "preBalances": [5_000_000_000i64, 1_000_000_000i64],
                "postBalances": [4_000_000_000i64, 2_000_000_000i64],
                "preTokenBalances": [],
                "postTokenBalances": [
                    {
                        "accountIndex": 1,
                        "mint": "UsdcMint",
                        "owner": "Receiver",
                        "uiTokenAmount": { "amount": "60000000", "decimals": 6, "uiAmount": 60.0, "uiAmountString": "60" }
                    }
                ]
            },
            "transaction": { "message": { "accountKeys": ["Sender", "Receiver"] } }
        });
        let tx: RpcTransaction = serde_json::from_value(raw).unwrap();
        let detail = tx.into_detail("sig-1");
        assert!(!detail.failed);
        assert_eq!(detail.lamport_delta_for("Receiver"), Some(1_000_000_000));
        assert_eq!(detail.token_delta_for(1, "UsdcMint"), 60_000_000);
    }
}
