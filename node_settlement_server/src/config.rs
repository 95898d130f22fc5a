use std::env;

use chrono::Duration;
use log::*;
use node_settlement_engine::db_types::MintTable;
use nsg_common::{
    helpers::{parse_boolean_flag, parse_int_flag},
    Secret,
};

const DEFAULT_NSG_HOST: &str = "127.0.0.1";
const DEFAULT_NSG_PORT: u16 = 8480;
const DEFAULT_PAYMENT_WINDOW: Duration = Duration::seconds(900);
const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The Solana JSON-RPC endpoint. Kept secret because provider URLs routinely embed API keys.
    pub solana_rpc_url: Secret<String>,
    pub payment: PaymentConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather
    /// than the connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_NSG_HOST.to_string(),
            port: DEFAULT_NSG_PORT,
            database_url: String::default(),
            solana_rpc_url: Secret::new(DEFAULT_RPC_URL.to_string()),
            payment: PaymentConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("NSG_HOST").ok().unwrap_or_else(|| DEFAULT_NSG_HOST.into());
        let port = env::var("NSG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for NSG_PORT. {e} Using the default, {DEFAULT_NSG_PORT}, instead."
                    );
                    DEFAULT_NSG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_NSG_PORT);
        let database_url = env::var("NSG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ NSG_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let solana_rpc_url = env::var("NSG_SOLANA_RPC_URL").map(Secret::new).unwrap_or_else(|_| {
            info!("🪛️ NSG_SOLANA_RPC_URL is not set. Using the public mainnet endpoint.");
            Secret::new(DEFAULT_RPC_URL.to_string())
        });
        let payment = PaymentConfig::from_env_or_default();
        let use_x_forwarded_for = parse_boolean_flag(env::var("NSG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("NSG_USE_FORWARDED").ok(), false);
        Self { host, port, database_url, solana_rpc_url, payment, use_x_forwarded_for, use_forwarded }
    }
}

//-------------------------------------------------  PaymentConfig  ---------------------------------------------------
/// Everything the payment routes need to open and verify pending payments.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// The address customers pay into.
    pub receiver_address: String,
    /// Mint addresses for the supported SPL tokens.
    pub mints: MintTable,
    /// How long an opened payment stays matchable. Doubles as the anti-replay window.
    pub validity_window: Duration,
    /// USD per SOL, used to derive the expected lamport amount for native payments. Native
    /// payments cannot be opened when this is unset.
    pub sol_usd_rate: Option<f64>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            receiver_address: String::default(),
            mints: MintTable::mainnet(),
            validity_window: DEFAULT_PAYMENT_WINDOW,
            sol_usd_rate: None,
        }
    }
}

impl PaymentConfig {
    pub fn from_env_or_default() -> Self {
        let receiver_address = env::var("NSG_RECEIVER_ADDRESS").ok().unwrap_or_else(|| {
            error!(
                "🪛️ NSG_RECEIVER_ADDRESS is not set. Payments cannot be opened until the receiving address is \
                 configured."
            );
            String::default()
        });
        let mut mints = MintTable::mainnet();
        if let Ok(mint) = env::var("NSG_USDC_MINT") {
            mints.usdc = mint;
        }
        if let Ok(mint) = env::var("NSG_USDT_MINT") {
            mints.usdt = mint;
        }
        let window_secs =
            parse_int_flag(env::var("NSG_PAYMENT_WINDOW").ok(), DEFAULT_PAYMENT_WINDOW.num_seconds());
        let validity_window = if window_secs > 0 {
            Duration::seconds(window_secs)
        } else {
            warn!(
                "🪛️ Invalid configuration value for NSG_PAYMENT_WINDOW. Using the default of {}s.",
                DEFAULT_PAYMENT_WINDOW.num_seconds()
            );
            DEFAULT_PAYMENT_WINDOW
        };
        let sol_usd_rate = env::var("NSG_SOL_USD_RATE").ok().and_then(|s| match s.trim().parse::<f64>() {
            Ok(rate) if rate > 0.0 => Some(rate),
            _ => {
                warn!("🪛️ Ignoring invalid value for NSG_SOL_USD_RATE: {s}");
                None
            },
        });
        if sol_usd_rate.is_none() {
            info!("🪛️ NSG_SOL_USD_RATE is not set. Native SOL payments are disabled for this session.");
        }
        Self { receiver_address, mints, validity_window, sol_usd_rate }
    }
}

//-------------------------------------------------  ServerOptions  ---------------------------------------------------
/// The subset of the server configuration that route handlers need. Kept small, and excludes
/// secrets so nothing sensitive gets passed around the request path.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
