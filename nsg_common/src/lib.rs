mod lamports;

pub mod helpers;
pub mod op;
mod secret;
mod usd;

pub use lamports::{Lamports, LamportsConversionError, LAMPORTS_PER_SOL, SOL_CURRENCY_CODE};
pub use secret::Secret;
pub use usd::{Usd, UsdConversionError, USD_CURRENCY_CODE};
