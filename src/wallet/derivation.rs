//! BIP-39 / BIP-44 wallet derivation
//!
//! Wallet `i` is derived at `m/44'/60'/0'/0/i`, the standard Ethereum
//! account path.

use alloy::signers::local::coins_bip39::English;
use alloy::signers::local::MnemonicBuilder;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::wallet::secret::Secret;

/// Number of wallets derived from one phrase by default
pub const DEFAULT_WALLET_COUNT: u32 = 100;

/// Derivation path up to (excluding) the address index
pub const DERIVATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/";

/// Derive `count` secrets at indices `0..count`
///
/// Only 12 and 24 word phrases are accepted. Whitespace between words is
/// normalised before the checksum is verified.
pub fn derive_wallets(phrase: &str, count: u32) -> Result<Vec<Secret>> {
    if count == 0 {
        return Err(Error::NonPositive("wallet count"));
    }

    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.len() != 12 && words.len() != 24 {
        return Err(Error::InvalidPhrase(format!(
            "expected 12 or 24 words, got {}",
            words.len()
        )));
    }
    let normalized = Zeroizing::new(words.join(" "));

    let mut secrets = Vec::with_capacity(count as usize);
    for index in 0..count {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(normalized.as_str())
            .derivation_path(format!("{}{}", DERIVATION_PATH_PREFIX, index))
            .map_err(|e| Error::InvalidPhrase(e.to_string()))?
            .build()
            .map_err(|e| Error::InvalidPhrase(e.to_string()))?;
        secrets.push(Secret::from_signer(&signer));
    }

    debug!("Derived {} wallet(s) from phrase", secrets.len());
    Ok(secrets)
}
