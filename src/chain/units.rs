//! Decimal conversion and display helpers
//!
//! Amounts move through the crate as raw `U256` token units. Conversion to
//! and from human decimals happens only here.

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, U256};

use crate::error::{Error, Result};

const WEI_PER_GWEI: f64 = 1e9;

/// Parse a human decimal amount ("12.5") into raw units
pub fn to_raw(amount: &str, decimals: u8) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.starts_with('-') {
        return Err(Error::NonPositive("amount"));
    }

    let parsed = parse_units(trimmed, decimals)
        .map_err(|e| Error::Config(format!("Invalid amount '{}': {}", amount, e)))?;
    Ok(parsed.get_absolute())
}

/// Format raw units as a decimal string
pub fn to_display(raw: U256, decimals: u8) -> String {
    format_units(raw, decimals).unwrap_or_else(|_| raw.to_string())
}

/// Convert a wei gas price to gwei
pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI
}

/// Convert gwei to wei, rounding down
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * WEI_PER_GWEI) as u128
}

/// `0x1234ab…` form for log lines
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    match full.get(..8) {
        Some(prefix) => format!("{}…", prefix),
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_raw_respects_decimals() {
        assert_eq!(to_raw("100", 6).unwrap(), U256::from(100_000_000u64));
        assert_eq!(to_raw(" 0.5 ", 18).unwrap(), U256::from(500_000_000_000_000_000u64));
    }

    #[test]
    fn test_to_raw_rejects_garbage_and_negatives() {
        assert!(matches!(to_raw("-1", 6), Err(Error::NonPositive(_))));
        assert!(to_raw("abc", 6).is_err());
    }

    #[test]
    fn test_to_display() {
        assert_eq!(to_display(U256::from(1_500_000u64), 6), "1.500000");
    }

    #[test]
    fn test_gwei_conversions() {
        assert_eq!(gwei_to_wei(2.0), 2_000_000_000);
        assert!((wei_to_gwei(25_000_000_000) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_address() {
        let address: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(short_address(&address), "0xf39Fd6…");
    }
}
