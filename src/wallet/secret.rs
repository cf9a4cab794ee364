//! Private key material
//!
//! A `Secret` is the 32-byte signing key of one wallet. It is zeroed on drop,
//! never printed by `Debug`, and only turned into a signer for the duration
//! of a single call.

use alloy::hex;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Private key controlling one wallet
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    bytes: [u8; 32],
}

impl Secret {
    /// Parse a `0x`-prefixed hex private key
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let Some(digits) = trimmed.strip_prefix("0x") else {
            return Err(Error::InvalidSecret("private key must start with 0x".into()));
        };

        let decoded = Zeroizing::new(
            hex::decode(digits)
                .map_err(|e| Error::InvalidSecret(format!("not valid hex: {}", e)))?,
        );
        if decoded.len() != 32 {
            return Err(Error::InvalidSecret(format!(
                "expected 32 bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        let secret = Self { bytes };

        // Reject zero and out-of-range scalars up front
        secret.signer()?;
        Ok(secret)
    }

    /// Capture the key of an existing signer
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Self {
            bytes: signer.to_bytes().0,
        }
    }

    /// Hex encoding with `0x` prefix
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.bytes)))
    }

    /// Build a transient signer for this key
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        PrivateKeySigner::from_bytes(&B256::from(self.bytes))
            .map_err(|e| Error::InvalidSecret(e.to_string()))
    }

    /// Wallet address controlled by this key
    pub fn address(&self) -> Result<Address> {
        Ok(self.signer()?.address())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Secret {}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}
