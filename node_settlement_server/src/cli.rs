use std::{env, env::VarError};

/// The gateway is configured entirely through environment variables, so any command-line argument
/// is taken as a request for help: print the usage notes plus the current (non-secret)
/// configuration and exit.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Explicit allow-list. NSG_SOLANA_RPC_URL stays out of it: hosted RPC URLs embed API keys.
    const DISPLAY_ENVS: [&str; 10] = [
        "RUST_LOG",
        "NSG_HOST",
        "NSG_PORT",
        "NSG_DATABASE_URL",
        "NSG_RECEIVER_ADDRESS",
        "NSG_USDC_MINT",
        "NSG_USDT_MINT",
        "NSG_PAYMENT_WINDOW",
        "NSG_USE_X_FORWARDED_FOR",
        "NSG_USE_FORWARDED",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
