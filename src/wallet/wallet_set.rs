//! Ordered set of unlocked wallets
//!
//! Order is significant: the scheduler rotates through wallets by index.
//! Secrets are unique by value.

use alloy::primitives::Address;
use tracing::{debug, info};

use crate::chain::units::short_address;
use crate::error::{Error, Result};
use crate::wallet::secret::Secret;

/// In-memory list of unlocked secrets
#[derive(Debug, Default, Clone)]
pub struct WalletSet {
    secrets: Vec<Secret>,
}

impl WalletSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, dropping duplicate secrets while keeping first-seen order
    pub fn from_secrets(secrets: Vec<Secret>) -> Self {
        let mut set = Self::new();
        set.merge(secrets);
        set
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    /// Get a specific wallet by index
    pub fn get(&self, index: usize) -> Option<&Secret> {
        self.secrets.get(index)
    }

    pub fn contains(&self, secret: &Secret) -> bool {
        self.secrets.contains(secret)
    }

    /// Add one `0x`-prefixed hex secret
    pub fn add_secret(&mut self, input: &str) -> Result<Address> {
        let secret = Secret::from_hex(input)?;
        let address = secret.address()?;
        if self.contains(&secret) {
            return Err(Error::DuplicateSecret(address.to_string()));
        }

        self.secrets.push(secret);
        info!("Added wallet {} ({} total)", short_address(&address), self.len());
        Ok(address)
    }

    /// Append secrets not already present, returning how many were new
    pub fn merge(&mut self, incoming: Vec<Secret>) -> usize {
        let before = self.len();
        for secret in incoming {
            if !self.contains(&secret) {
                self.secrets.push(secret);
            }
        }
        let added = self.len() - before;
        debug!("Merged {} new wallet(s), {} total", added, self.len());
        added
    }

    /// Remove the wallet at `index`
    pub fn remove(&mut self, index: usize) -> Result<Secret> {
        if index >= self.len() {
            return Err(Error::Config(format!(
                "Wallet index {} out of range (have {})",
                index,
                self.len()
            )));
        }
        Ok(self.secrets.remove(index))
    }

    /// Addresses in rotation order
    pub fn addresses(&self) -> Result<Vec<Address>> {
        self.secrets.iter().map(Secret::address).collect()
    }
}
