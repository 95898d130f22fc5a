//! The seams of the engine.
//!
//! [`LedgerReader`] abstracts the read-only blockchain query surface the payment matcher depends
//! on, and [`SettlementDatabase`] abstracts the durable store behind the discount authority, the
//! trial guard and settlement finalization. The engine ships a JSON-RPC implementation of the
//! former ([`crate::rpc::SolanaRpc`]) and a SQLite implementation of the latter
//! ([`crate::SqliteDatabase`]).

mod ledger;
mod settlement_database;

pub use ledger::{LedgerError, LedgerReader, SignatureInfo, TokenBalance, TransactionDetail};
pub use settlement_database::{SettlementDatabase, SettlementDbError, TrialOutcome};
