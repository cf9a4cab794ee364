//! Run parameters
//!
//! A `SwapConfiguration` is built per run from CLI input and never
//! persisted.

use std::time::Duration;

use alloy::primitives::{Address, U256};

use crate::error::{Error, Result};
use crate::registry::TokenInfo;
use crate::trading::Direction;

/// Parameters of one swap run
#[derive(Debug, Clone)]
pub struct SwapConfiguration {
    pub input_token: TokenInfo,
    pub output_token: TokenInfo,
    /// Raw units of the input token for the first cycle (every cycle when forwarding)
    pub per_cycle_amount: U256,
    /// Each pair is one forward and one reverse swap
    pub total_cycle_pairs: u32,
    pub interval: Duration,
    pub forward_to: Option<Address>,
}

impl SwapConfiguration {
    /// Check everything that can be checked without the wallet set
    pub fn validate_parameters(&self) -> Result<()> {
        if self.input_token.address == self.output_token.address {
            return Err(Error::SameToken(self.input_token.symbol.clone()));
        }
        if self.per_cycle_amount.is_zero() {
            return Err(Error::NonPositive("per-cycle amount"));
        }
        if self.total_cycle_pairs == 0 {
            return Err(Error::NonPositive("cycle pair count"));
        }
        if self.interval.is_zero() {
            return Err(Error::NonPositive("interval"));
        }
        if self.forward_to == Some(Address::ZERO) {
            return Err(Error::InvalidAddress("forward target is the zero address".into()));
        }
        Ok(())
    }

    /// Full validation against the wallets that will rotate
    pub fn validate(&self, wallets: &[Address]) -> Result<()> {
        self.validate_parameters()?;
        if wallets.is_empty() {
            return Err(Error::NoWallets);
        }
        if let Some(target) = self.forward_to {
            if wallets.contains(&target) {
                return Err(Error::ForwardTargetInRotation(target.to_string()));
            }
        }
        Ok(())
    }

    /// Number of swaps in the whole run
    pub fn target_count(&self) -> u64 {
        2 * u64::from(self.total_cycle_pairs)
    }

    /// In forwarding mode every cycle is an outbound swap of the fixed amount
    pub fn is_fixed_leg(&self) -> bool {
        self.forward_to.is_some()
    }

    /// (from, to) tokens for a direction
    pub fn legs(&self, direction: Direction) -> (&TokenInfo, &TokenInfo) {
        match direction {
            Direction::Forward => (&self.input_token, &self.output_token),
            Direction::Reverse => (&self.output_token, &self.input_token),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const USDC: Address = Address::repeat_byte(0x01);
    pub const WAVAX: Address = Address::repeat_byte(0x02);

    pub fn token(symbol: &str, address: Address, decimals: u8) -> TokenInfo {
        TokenInfo {
            symbol: symbol.to_string(),
            address,
            decimals,
            logo: None,
        }
    }

    pub fn config(pairs: u32, forward_to: Option<Address>) -> SwapConfiguration {
        SwapConfiguration {
            input_token: token("USDC", USDC, 6),
            output_token: token("WAVAX", WAVAX, 18),
            per_cycle_amount: U256::from(100u64),
            total_cycle_pairs: pairs,
            interval: Duration::from_secs(5),
            forward_to,
        }
    }
}
