//! CLI command implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use dialoguer::{Confirm, Password};
use tracing::{error, info, warn};
use zeroize::Zeroizing;

use crate::chain::units::{self, short_address};
use crate::chain::{RpcChainClient, TokenContract};
use crate::config::Config;
use crate::error::Error;
use crate::fee_guard::{AdmissionGate, FeeGuard, FEE_POLL_INTERVAL};
use crate::registry::{TokenInfo, TokenRegistry};
use crate::scheduler::{RunOutcome, SwapConfiguration, SwapScheduler};
use crate::trading::SwapExecutor;
use crate::wallet::{derive_wallets, JsonFileStore, KeyVault, WalletSet, MIN_PASSWORD_LEN};

/// Arguments of the `run` command
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub pairs: u32,
    pub interval_secs: u64,
    pub forward_to: Option<String>,
    pub yes: bool,
}

fn open_vault(config: &Config) -> Result<KeyVault> {
    let store = JsonFileStore::open(Path::new(&config.vault.path))
        .with_context(|| format!("Cannot open vault at {}", config.vault.path))?;
    Ok(KeyVault::new(store, config.vault.kdf_params()))
}

fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    Ok(Zeroizing::new(Password::new().with_prompt(prompt).interact()?))
}

fn prompt_new_password() -> Result<Zeroizing<String>> {
    let password = Zeroizing::new(
        Password::new()
            .with_prompt(format!("New vault password (min {} characters)", MIN_PASSWORD_LEN))
            .with_confirmation("Repeat password", "Passwords do not match")
            .interact()?,
    );
    crate::wallet::cipher::check_password_strength(&password)?;
    Ok(password)
}

/// Unlock the vault, or start an empty set under a new password
async fn unlock_or_init(vault: &KeyVault) -> Result<(WalletSet, Zeroizing<String>)> {
    if vault.is_initialized().await? {
        let password = prompt_password("Vault password")?;
        let secrets = vault.verify_and_decrypt(&password).await?;
        Ok((WalletSet::from_secrets(secrets), password))
    } else {
        println!("No vault found. Choose a password to create one.");
        Ok((WalletSet::new(), prompt_new_password()?))
    }
}

async fn unlock(vault: &KeyVault) -> Result<WalletSet> {
    let password = prompt_password("Vault password")?;
    let secrets = vault.verify_and_decrypt(&password).await?;
    Ok(WalletSet::from_secrets(secrets))
}

/// Show whether a vault exists and how many secrets it holds
pub async fn vault_status(config: &Config) -> Result<()> {
    let vault = open_vault(config)?;

    println!("\n=== VAULT STATUS ===\n");
    println!("Path: {}", config.vault.path);
    if vault.is_initialized().await? {
        println!("Initialized: yes");
        println!("Stored secrets: {}", vault.record_count().await?);
    } else {
        println!("Initialized: no");
        println!("Add a key with 'swapbot vault add-key' or 'swapbot vault add-phrase'.");
    }
    Ok(())
}

/// Add a single private key, prompting for it when not given
pub async fn vault_add_key(config: &Config, key: Option<String>) -> Result<()> {
    let vault = open_vault(config)?;
    let (mut wallets, password) = unlock_or_init(&vault).await?;

    let key = match key {
        Some(key) => Zeroizing::new(key),
        None => prompt_password("Private key (0x…)")?,
    };
    let address = wallets.add_secret(&key)?;
    vault.encrypt_and_store(wallets.secrets(), &password).await?;

    println!("Added wallet {} ({} total)", address, wallets.len());
    Ok(())
}

/// Derive wallets from a recovery phrase and add the new ones
pub async fn vault_add_phrase(config: &Config, count: Option<u32>) -> Result<()> {
    let vault = open_vault(config)?;
    let (mut wallets, password) = unlock_or_init(&vault).await?;

    let phrase = prompt_password("Recovery phrase (12 or 24 words)")?;
    let count = count.unwrap_or(config.derivation.wallet_count);
    info!("Deriving {} wallet(s) from phrase", count);

    let derived = tokio::task::spawn_blocking(move || derive_wallets(&phrase, count)).await??;
    let added = wallets.merge(derived);
    if added == 0 {
        println!("All {} derived wallet(s) were already in the vault", count);
        return Ok(());
    }

    vault.encrypt_and_store(wallets.secrets(), &password).await?;
    println!("Added {} new wallet(s) ({} total)", added, wallets.len());
    Ok(())
}

/// List wallet addresses in rotation order
pub async fn vault_list(config: &Config) -> Result<()> {
    let vault = open_vault(config)?;
    let wallets = unlock(&vault).await?;

    println!("\n=== WALLETS ({}) ===\n", wallets.len());
    for (index, address) in wallets.addresses()?.iter().enumerate() {
        println!("  #{:<3} {}", index, address);
    }
    Ok(())
}

/// Print one private key
pub async fn vault_reveal(config: &Config, index: usize) -> Result<()> {
    let vault = open_vault(config)?;
    let wallets = unlock(&vault).await?;
    let secret = wallets
        .get(index)
        .with_context(|| format!("No wallet #{} (have {})", index, wallets.len()))?;

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Print the private key of {} to the terminal?",
            secret.address()?
        ))
        .default(false)
        .interact()?;
    if !confirmed {
        info!("Reveal cancelled by user");
        return Ok(());
    }

    println!("{}", secret.to_hex().as_str());
    Ok(())
}

/// Remove one wallet
pub async fn vault_remove(config: &Config, index: usize, force: bool) -> Result<()> {
    let vault = open_vault(config)?;
    let password = prompt_password("Vault password")?;
    let mut wallets = WalletSet::from_secrets(vault.verify_and_decrypt(&password).await?);

    let address = wallets
        .get(index)
        .with_context(|| format!("No wallet #{} (have {})", index, wallets.len()))?
        .address()?;
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove wallet {} from the vault?", address))
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Remove cancelled by user");
            return Ok(());
        }
    }

    wallets.remove(index)?;
    if wallets.is_empty() {
        vault.clear().await?;
    } else {
        vault.encrypt_and_store(wallets.secrets(), &password).await?;
    }
    println!("Removed {} ({} left)", address, wallets.len());
    Ok(())
}

/// Delete every stored secret and the password
pub async fn vault_clear(config: &Config, force: bool) -> Result<()> {
    let vault = open_vault(config)?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt("Delete ALL stored keys? Funds are lost unless you have backups.")
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Clear cancelled by user");
            return Ok(());
        }
    }

    vault.clear().await?;
    println!("Vault cleared");
    Ok(())
}

/// List enabled tokens and treasury wallets
pub fn tokens(config: &Config) -> Result<()> {
    let registry = TokenRegistry::from_config(config)?;

    println!("\n=== TOKENS ===\n");
    for token in registry.tokens() {
        println!("  {:<8} {} ({} decimals)", token.symbol, token.address, token.decimals);
    }

    println!("\n=== TREASURY WALLETS ===\n");
    if registry.treasuries().is_empty() {
        println!("  (none)");
    }
    for wallet in registry.treasuries() {
        println!("  {:<12} {}", wallet.label, wallet.address);
    }
    Ok(())
}

async fn connect(config: &Config) -> Result<Arc<RpcChainClient>> {
    let client = RpcChainClient::connect(&config.rpc, config.router_address()?).await?;
    Ok(Arc::new(client))
}

/// Show the current gas price against the ceiling
pub async fn gas(config: &Config) -> Result<()> {
    let chain = connect(config).await?;
    let guard = FeeGuard::new(chain, config.fee_guard.ceiling_gwei);
    let level = guard.refresh().await?;

    println!("\n=== GAS ===\n");
    println!("Price:   {:.3} gwei", level.price_gwei());
    println!("Ceiling: {:.3} gwei", guard.ceiling_gwei());
    let status = if level.admits() {
        "OK, swaps may run"
    } else {
        "HIGH, swaps will wait"
    };
    println!("Status:  {}", status);
    Ok(())
}

/// One wallet's holdings of a token pair
#[derive(Debug, Clone)]
pub struct BalanceView {
    pub wallet: Address,
    pub from_balance: U256,
    pub to_balance: U256,
}

impl BalanceView {
    /// Rows formatted with each token's decimals
    pub fn lines(&self, from: &TokenInfo, to: &TokenInfo) -> Vec<String> {
        vec![
            format!("  {:<8} {}", from.symbol, units::to_display(self.from_balance, from.decimals)),
            format!("  {:<8} {}", to.symbol, units::to_display(self.to_balance, to.decimals)),
        ]
    }
}

/// Show one wallet's balance of a token pair
pub async fn balances(config: &Config, from: &str, to: &str, wallet_index: usize) -> Result<()> {
    let registry = TokenRegistry::from_config(config)?;
    let (from, to) = (registry.token(from)?, registry.token(to)?);

    let vault = open_vault(config)?;
    let wallets = unlock(&vault).await?;
    let owner = wallets
        .get(wallet_index)
        .with_context(|| format!("No wallet #{} (have {})", wallet_index, wallets.len()))?
        .address()?;

    let chain = connect(config).await?;
    let (from_balance, to_balance) = futures::try_join!(
        chain.balance_of(from.address, owner),
        chain.balance_of(to.address, owner)
    )?;
    let view = BalanceView {
        wallet: owner,
        from_balance,
        to_balance,
    };

    println!("\n=== BALANCES: {} ===\n", view.wallet);
    for line in view.lines(from, to) {
        println!("{}", line);
    }
    Ok(())
}

/// Turn CLI input into a validated run configuration
pub fn build_swap_configuration(
    registry: &TokenRegistry,
    args: &RunArgs,
) -> Result<SwapConfiguration> {
    let input_token = registry.token(&args.from)?.clone();
    let output_token = registry.token(&args.to)?.clone();
    let per_cycle_amount = units::to_raw(&args.amount, input_token.decimals)?;
    let forward_to = args
        .forward_to
        .as_deref()
        .map(|target| registry.resolve_forward_target(target))
        .transpose()?;

    let swap_config = SwapConfiguration {
        input_token,
        output_token,
        per_cycle_amount,
        total_cycle_pairs: args.pairs,
        interval: Duration::from_secs(args.interval_secs),
        forward_to,
    };
    swap_config.validate_parameters()?;
    Ok(swap_config)
}

/// Run a ping-pong swap sequence until done, failed or interrupted
pub async fn run(config: &Config, args: RunArgs) -> Result<()> {
    let registry = TokenRegistry::from_config(config)?;
    let swap_config = build_swap_configuration(&registry, &args)?;

    println!("\n=== SWAP RUN ===\n");
    println!(
        "Pair:      {} ⇄ {}",
        swap_config.input_token.symbol, swap_config.output_token.symbol
    );
    println!("Amount:    {} {}", args.amount, swap_config.input_token.symbol);
    println!(
        "Cycles:    {} pair(s), {} swap(s), every {}s",
        swap_config.total_cycle_pairs,
        swap_config.target_count(),
        args.interval_secs
    );
    if let Some(target) = swap_config.forward_to {
        println!("Forward:   outbound proceeds to {}", target);
    }
    println!("Gas limit: below {} gwei\n", config.fee_guard.ceiling_gwei);

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Start trading with real funds?")
            .default(false)
            .interact()?;
        if !confirmed {
            info!("Run cancelled by user");
            return Ok(());
        }
    }

    let vault = open_vault(config)?;
    let wallets = unlock(&vault).await?;
    info!("Unlocked {} wallet(s)", wallets.len());

    let chain = connect(config).await?;
    for token in [&swap_config.input_token, &swap_config.output_token] {
        let on_chain = chain.decimals(token.address).await?;
        if on_chain != token.decimals {
            anyhow::bail!(
                "{} is configured with {} decimals but the contract reports {}",
                token.symbol,
                token.decimals,
                on_chain
            );
        }
    }
    let guard = Arc::new(FeeGuard::new(chain.clone(), config.fee_guard.ceiling_gwei));
    if let Err(e) = guard.refresh().await {
        warn!("Initial gas poll failed, first cycle will wait: {}", e);
    }
    let poller = guard.spawn(FEE_POLL_INTERVAL);

    let executor = Arc::new(SwapExecutor::new(chain));
    let scheduler = Arc::new(SwapScheduler::new(executor, guard.clone()));
    let run_id = scheduler.start(swap_config.clone(), wallets).await?;

    let stopper = scheduler.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current swap");
            stopper.stop().await;
        }
    });

    let outcome = scheduler.wait().await;
    ctrl_c.abort();
    guard.stop();
    let _ = poller.await;

    let state = scheduler.snapshot().await;
    let carried_token = swap_config.legs(state.direction).0;
    println!("\n=== RUN {} ===\n", run_id);
    println!("Executed:   {}/{}", state.executed_count, state.target_count);
    println!("Gas delays: {}", state.fee_delays);
    if state.executed_count > 0 && !swap_config.is_fixed_leg() {
        println!(
            "Carried:    {} {}",
            units::to_display(state.last_amount_carried, carried_token.decimals),
            carried_token.symbol
        );
    }
    let gas_now = guard.current_fee_level().await;
    if gas_now.is_known() {
        println!("Gas now:    {:.3} gwei", gas_now.price_gwei());
    }

    match outcome? {
        RunOutcome::Completed { executed } => {
            println!("Status:     completed ({} swaps)", executed);
            Ok(())
        }
        RunOutcome::Stopped { executed } => {
            println!("Status:     stopped after {} swap(s)", executed);
            Ok(())
        }
        RunOutcome::Failed(failure) => {
            error!(
                "Cycle {} on wallet #{} ({}) failed",
                failure.cycle,
                failure.wallet_index,
                short_address(&failure.wallet)
            );
            let context = format!("Run failed at cycle {}", failure.cycle);
            Err(anyhow::Error::new(failure.error).context(context))
        }
    }
}

/// Next step to suggest for a failed command, by error group
pub fn failure_hint(err: &anyhow::Error) -> Option<&'static str> {
    let err = err.downcast_ref::<Error>()?;
    if err.is_custody() {
        Some("Check the vault password, or inspect the vault with 'swapbot vault status'")
    } else if err.is_configuration() {
        Some("Check the command arguments and the token list in 'swapbot tokens'")
    } else if err.is_execution() {
        Some("Check wallet funds with 'swapbot balances' and gas with 'swapbot gas'")
    } else {
        None
    }
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}
