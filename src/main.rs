//! SwapBot - multi-wallet ping-pong swap agent
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Every swap pays gas and router fees; ping-pong cycles lose value over time.
//! - Keep backups of your keys. Clearing the vault cannot be undone.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Use the library crate
use swapbot::cli::commands::{self, RunArgs};
use swapbot::config::Config;

/// SwapBot - multi-wallet ping-pong swap agent
#[derive(Parser)]
#[command(name = "swapbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "swapbot.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a swap sequence across all vault wallets
    Run {
        /// Input token symbol or address
        #[arg(long)]
        from: String,

        /// Output token symbol or address
        #[arg(long)]
        to: String,

        /// Amount of the input token per cycle, e.g. "25" or "0.5"
        #[arg(long)]
        amount: String,

        /// Number of forward+reverse pairs
        #[arg(long, default_value = "1")]
        pairs: u32,

        /// Seconds between cycles
        #[arg(long, default_value = "60")]
        interval: u64,

        /// Treasury label or address receiving outbound proceeds
        #[arg(long)]
        forward_to: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show a wallet's balances for a token pair
    Balances {
        /// Input token symbol or address
        #[arg(long)]
        from: String,

        /// Output token symbol or address
        #[arg(long)]
        to: String,

        /// Wallet index in rotation order
        #[arg(long, default_value = "0")]
        wallet: usize,
    },

    /// Show current gas price against the ceiling
    Gas,

    /// List configured tokens and treasury wallets
    Tokens,

    /// Show current configuration (secrets masked)
    Config,

    /// Key vault management
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },
}

#[derive(Subcommand)]
enum VaultAction {
    /// Show whether the vault exists and how many keys it holds
    Status,

    /// Add one private key (prompted when omitted)
    AddKey {
        /// 0x-prefixed hex private key
        key: Option<String>,
    },

    /// Derive wallets from a recovery phrase
    AddPhrase {
        /// Number of wallets to derive (default from config)
        #[arg(long)]
        count: Option<u32>,
    },

    /// List wallet addresses
    List,

    /// Print one private key
    Reveal { index: usize },

    /// Remove one wallet
    Remove {
        index: usize,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Delete all stored keys
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swapbot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded configuration from {}", cli.config);

    // Execute command
    let result = match cli.command {
        Commands::Run {
            from,
            to,
            amount,
            pairs,
            interval,
            forward_to,
            yes,
        } => {
            let args = RunArgs {
                from,
                to,
                amount,
                pairs,
                interval_secs: interval,
                forward_to,
                yes,
            };
            commands::run(&config, args).await
        }
        Commands::Balances { from, to, wallet } => {
            commands::balances(&config, &from, &to, wallet).await
        }
        Commands::Gas => commands::gas(&config).await,
        Commands::Tokens => commands::tokens(&config),
        Commands::Config => commands::show_config(&config),
        Commands::Vault { action } => match action {
            VaultAction::Status => commands::vault_status(&config).await,
            VaultAction::AddKey { key } => commands::vault_add_key(&config, key).await,
            VaultAction::AddPhrase { count } => commands::vault_add_phrase(&config, count).await,
            VaultAction::List => commands::vault_list(&config).await,
            VaultAction::Reveal { index } => commands::vault_reveal(&config, index).await,
            VaultAction::Remove { index, force } => {
                commands::vault_remove(&config, index, force).await
            }
            VaultAction::Clear { force } => commands::vault_clear(&config, force).await,
        },
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        if let Some(hint) = commands::failure_hint(&e) {
            info!("{}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}
