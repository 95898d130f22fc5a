//! # Node settlement server
//! The HTTP surface over the settlement core. It is responsible for:
//! * Quoting plan selections, with discount codes validated server-side on every request.
//! * Gating free-trial claims, taking the network origin from the connection (or forwarded
//!   headers, when configured behind a proxy).
//! * Opening and checking pending payments against the Solana ledger.
//! * Finalizing settlements exactly once per reference.
//!
//! ## Configuration
//! The server is configured via `NSG_*` environment variables. See [config] for the full list.
//!
//! ## Routes
//! * `GET /health`: liveness check.
//! * Under `/api`: `POST /quote`, `POST /code/validate`, `POST /trial/claim`,
//!   `POST /payment/open`, `POST /payment/check`, `POST /settlement`.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
