//! Router quotes and slippage bounds

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Accepted slippage: 5%
pub const SLIPPAGE_BPS: u64 = 500;

const BPS_DENOMINATOR: u64 = 10_000;

/// Router quote with the minimum output accepted on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
    pub expected_output: U256,
    pub minimum_acceptable_output: U256,
}

impl QuoteResult {
    /// Apply `slippage_bps` to the expected output, rounding down
    pub fn with_slippage(expected_output: U256, slippage_bps: u64) -> Self {
        let keep = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps));
        Self {
            expected_output,
            minimum_acceptable_output: expected_output * keep / U256::from(BPS_DENOMINATOR),
        }
    }

    /// Quote with the default 5% slippage
    pub fn from_expected(expected_output: U256) -> Self {
        Self::with_slippage(expected_output, SLIPPAGE_BPS)
    }
}
