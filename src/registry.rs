//! Token and treasury registry
//!
//! Built once per command from the configuration. A running scheduler holds
//! its own copy of the tokens it trades, so later registry changes never
//! affect a run in progress.

use std::str::FromStr;

use alloy::primitives::Address;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};

/// An ERC-20 token the agent may trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    pub logo: Option<String>,
}

/// A labelled wallet that may receive forwarded proceeds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreasuryWallet {
    pub label: String,
    pub address: Address,
}

/// Enabled tokens and treasury wallets
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: Vec<TokenInfo>,
    treasuries: Vec<TreasuryWallet>,
}

fn parse_address(input: &str, what: &str) -> Result<Address> {
    Address::from_str(input.trim())
        .map_err(|e| Error::InvalidAddress(format!("{} '{}': {}", what, input, e)))
}

impl TokenRegistry {
    /// Snapshot the enabled entries of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::default();

        for token in config.tokens.iter().filter(|t| t.enabled) {
            if token.symbol.trim().is_empty() {
                return Err(Error::Config("token symbol must not be empty".into()));
            }
            let address = parse_address(&token.address, &token.symbol)?;
            if registry.find_token(&token.symbol).is_some() {
                return Err(Error::Config(format!("duplicate token symbol {}", token.symbol)));
            }
            if registry.token_by_address(&address).is_some() {
                return Err(Error::Config(format!("duplicate token address {}", address)));
            }
            registry.tokens.push(TokenInfo {
                symbol: token.symbol.trim().to_string(),
                address,
                decimals: token.decimals,
                logo: token.logo.clone(),
            });
        }

        for wallet in config.treasury_wallets.iter().filter(|w| w.enabled) {
            let address = parse_address(&wallet.address, &wallet.label)?;
            if address == Address::ZERO {
                return Err(Error::InvalidAddress(format!(
                    "treasury wallet {} is the zero address",
                    wallet.label
                )));
            }
            if registry
                .treasuries
                .iter()
                .any(|t| t.label.eq_ignore_ascii_case(wallet.label.trim()))
            {
                return Err(Error::Config(format!("duplicate treasury label {}", wallet.label)));
            }
            registry.treasuries.push(TreasuryWallet {
                label: wallet.label.trim().to_string(),
                address,
            });
        }

        Ok(registry)
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    pub fn treasuries(&self) -> &[TreasuryWallet] {
        &self.treasuries
    }

    fn find_token(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    /// Look up an enabled token by symbol (case-insensitive) or address
    pub fn token(&self, symbol_or_address: &str) -> Result<&TokenInfo> {
        if let Some(token) = self.find_token(symbol_or_address) {
            return Ok(token);
        }
        Address::from_str(symbol_or_address.trim())
            .ok()
            .and_then(|address| self.token_by_address(&address))
            .ok_or_else(|| Error::UnknownToken(symbol_or_address.to_string()))
    }

    fn token_by_address(&self, address: &Address) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.address == *address)
    }

    /// Resolve a forward target given as a treasury label or a raw address
    pub fn resolve_forward_target(&self, label_or_address: &str) -> Result<Address> {
        let wanted = label_or_address.trim();
        if let Some(wallet) = self
            .treasuries
            .iter()
            .find(|t| t.label.eq_ignore_ascii_case(wanted))
        {
            return Ok(wallet.address);
        }

        let address = parse_address(wanted, "forward target")?;
        if address == Address::ZERO {
            return Err(Error::InvalidAddress("forward target is the zero address".into()));
        }
        Ok(address)
    }
}
