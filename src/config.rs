//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::registry::TokenRegistry;
use crate::wallet::KdfParams;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub fee_guard: FeeGuardConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub derivation: DerivationConfig,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub treasury_wallets: Vec<TreasuryWalletConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Per-attempt timeout for read calls
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// First backoff delay for read retries
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Give up retrying a read after this long
    #[serde(default = "default_max_retry_elapsed_ms")]
    pub max_retry_elapsed_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_router_address")]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeGuardConfig {
    /// Swaps are delayed while gas is at or above this price
    #[serde(default = "default_ceiling_gwei")]
    pub ceiling_gwei: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_path")]
    pub path: String,
    #[serde(default = "default_kdf_memory_kib")]
    pub kdf_memory_kib: u32,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl VaultConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivationConfig {
    /// Wallets derived per recovery phrase
    #[serde(default = "default_wallet_count")]
    pub wallet_count: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: String,
    pub decimals: u8,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TreasuryWalletConfig {
    pub label: String,
    pub address: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_rpc_endpoint() -> String {
    "https://api.avax.network/ext/bc/C/rpc".to_string()
}
fn default_chain_id() -> u64 {
    43114
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_retry_base_delay_ms() -> u64 {
    200
}
fn default_max_retry_elapsed_ms() -> u64 {
    5_000
}
fn default_router_address() -> String {
    // Trader Joe V1 router
    "0x60aE616a2155Ee3d9A68541Ba4544862310933d4".to_string()
}
fn default_ceiling_gwei() -> f64 {
    2.0
}
fn default_vault_path() -> String {
    "swapbot-vault.json".to_string()
}
fn default_kdf_memory_kib() -> u32 {
    KdfParams::default().memory_kib
}
fn default_kdf_iterations() -> u32 {
    KdfParams::default().iterations
}
fn default_kdf_parallelism() -> u32 {
    KdfParams::default().parallelism
}
fn default_wallet_count() -> u32 {
    crate::wallet::DEFAULT_WALLET_COUNT
}
fn default_true() -> bool {
    true
}
fn default_tokens() -> Vec<TokenConfig> {
    vec![
        TokenConfig {
            symbol: "USDC".to_string(),
            address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E".to_string(),
            decimals: 6,
            logo: None,
            enabled: true,
        },
        TokenConfig {
            symbol: "WAVAX".to_string(),
            address: "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7".to_string(),
            decimals: 18,
            logo: None,
            enabled: true,
        },
    ]
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            chain_id: default_chain_id(),
            timeout_ms: default_timeout_ms(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_retry_elapsed_ms: default_max_retry_elapsed_ms(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            address: default_router_address(),
        }
    }
}

impl Default for FeeGuardConfig {
    fn default() -> Self {
        Self {
            ceiling_gwei: default_ceiling_gwei(),
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
            kdf_memory_kib: default_kdf_memory_kib(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self {
            wallet_count: default_wallet_count(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            router: RouterConfig::default(),
            fee_guard: FeeGuardConfig::default(),
            vault: VaultConfig::default(),
            derivation: DerivationConfig::default(),
            tokens: default_tokens(),
            treasury_wallets: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.chain_id", default_chain_id() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SWAPBOT_)
            .add_source(
                config::Environment::with_prefix("SWAPBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.rpc.endpoint)
            .with_context(|| format!("Invalid rpc.endpoint: {}", mask_url(&self.rpc.endpoint)))?;

        if self.rpc.chain_id == 0 {
            anyhow::bail!("rpc.chain_id must be positive");
        }
        if self.rpc.timeout_ms == 0 {
            anyhow::bail!("rpc.timeout_ms must be positive");
        }

        self.router_address()?;

        if !self.fee_guard.ceiling_gwei.is_finite() || self.fee_guard.ceiling_gwei <= 0.0 {
            anyhow::bail!("fee_guard.ceiling_gwei must be a positive number");
        }

        if self.vault.path.trim().is_empty() {
            anyhow::bail!("vault.path must not be empty");
        }
        if self.vault.kdf_iterations == 0 || self.vault.kdf_parallelism == 0 {
            anyhow::bail!("vault.kdf_iterations and vault.kdf_parallelism must be positive");
        }
        if self.vault.kdf_memory_kib < 8 * self.vault.kdf_parallelism {
            anyhow::bail!("vault.kdf_memory_kib must be at least 8 × kdf_parallelism");
        }

        if self.derivation.wallet_count == 0 {
            anyhow::bail!("derivation.wallet_count must be positive");
        }

        // Token and treasury addresses, duplicate symbols and labels
        TokenRegistry::from_config(self).context("Invalid token or treasury list")?;

        Ok(())
    }

    /// Parsed router address
    pub fn router_address(&self) -> Result<alloy::primitives::Address> {
        self.router
            .address
            .parse()
            .with_context(|| format!("Invalid router.address: {}", self.router.address))
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let tokens: Vec<String> = self
            .tokens
            .iter()
            .map(|t| {
                format!(
                    "    {} {} ({} decimals){}",
                    t.symbol,
                    t.address,
                    t.decimals,
                    if t.enabled { "" } else { " [disabled]" }
                )
            })
            .collect();
        let treasuries: Vec<String> = self
            .treasury_wallets
            .iter()
            .map(|w| {
                format!(
                    "    {} {}{}",
                    w.label,
                    w.address,
                    if w.enabled { "" } else { " [disabled]" }
                )
            })
            .collect();

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    chain_id: {}
    timeout: {}ms
  Router:
    address: {}
  Fee Guard:
    ceiling: {} gwei
  Vault:
    path: {}
    kdf: argon2id m={}KiB t={} p={}
  Derivation:
    wallet_count: {}
  Tokens:
{}
  Treasury Wallets:
{}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.chain_id,
            self.rpc.timeout_ms,
            self.router.address,
            self.fee_guard.ceiling_gwei,
            self.vault.path,
            self.vault.kdf_memory_kib,
            self.vault.kdf_iterations,
            self.vault.kdf_parallelism,
            self.derivation.wallet_count,
            tokens.join("\n"),
            if treasuries.is_empty() {
                "    (none)".to_string()
            } else {
                treasuries.join("\n")
            },
        )
    }
}

/// Mask API keys in URLs (query strings and path keys)
fn mask_url(url: &str) -> String {
    let base = match url.find('?') {
        Some(idx) => format!("{}?***", &url[..idx]),
        None => url.to_string(),
    };

    // Providers such as Infura put the key in the last path segment
    match base.rfind('/') {
        Some(idx) if base[idx + 1..].len() >= 24 && !base[idx + 1..].contains('?') => {
            format!("{}/***", &base[..idx])
        }
        _ => base,
    }
}
