//! Stealth Trading Engine CLI
//!
//! # WARNING
//! - This tool submits transactions with real value. Only use funds you
//!   can afford to lose.
//! - Behavioral obfuscation reduces, but does not eliminate, the
//!   statistical footprint of automated trading.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use stealth_trader::cli::commands;
use stealth_trader::config::Config;

/// Stealth trading engine - low-signature transaction submission
#[derive(Parser)]
#[command(name = "stealth")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the gas oracle and print the tier table
    Gas,

    /// Generate an obfuscated execution plan for one trade intent
    Plan {
        /// Token address or symbol
        token: String,

        /// Trade amount in native units
        amount: f64,

        /// Operation: buy or sell
        #[arg(long, default_value = "buy")]
        op: String,

        /// Destination venue, for countermeasure lookup
        #[arg(long)]
        venue: Option<String>,
    },

    /// Check a mined block for front-running around a transaction
    Frontrun {
        /// Our transaction hash
        tx_hash: String,

        /// Block number the transaction was mined in
        block: u64,
    },

    /// List the loaded trader profiles
    Profiles,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stealth_trader=info".parse()?),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Gas => commands::gas(&config).await,
        Commands::Plan {
            token,
            amount,
            op,
            venue,
        } => commands::plan(&config, &token, amount, &op, venue).await,
        Commands::Frontrun { tx_hash, block } => commands::frontrun(&config, &tx_hash, block).await,
        Commands::Profiles => commands::profiles(&config),
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
