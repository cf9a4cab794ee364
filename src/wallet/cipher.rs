//! Password-based encryption for stored keys
//!
//! ```text
//! password ── Argon2id(salt) ──> master key ── HKDF-SHA256 ──> AES-256-GCM key
//! password ── Argon2id(own salt) ──> PHC verification hash
//! ```
//!
//! The verification hash and the encryption key are derived independently,
//! so the stored hash reveals nothing about the key.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HKDF_INFO: &[u8] = b"swapbot-vault-v1";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| Error::Crypto(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`]
pub fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// One-way hash of the password in PHC string format
pub fn hash_password(password: &str, params: &KdfParams) -> Result<String> {
    let salt = SaltString::encode_b64(&random_salt())
        .map_err(|e| Error::Crypto(format!("Salt encoding failed: {}", e)))?;
    let hash = params
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Crypto(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Compare a password against a stored PHC hash
///
/// The cost parameters are read from the hash itself.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| Error::Storage(format!("Stored password hash is malformed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh random KDF salt
pub fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// AES-256-GCM cipher keyed from a password
pub struct VaultCipher {
    key: Zeroizing<[u8; 32]>,
}

impl VaultCipher {
    /// Derive the cipher key from a password and salt
    pub fn derive(password: &str, salt: &[u8], params: &KdfParams) -> Result<Self> {
        let mut master = Zeroizing::new([0u8; 32]);
        params
            .argon2()?
            .hash_password_into(password.as_bytes(), salt, master.as_mut())
            .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

        let hkdf = Hkdf::<Sha256>::new(None, master.as_ref());
        let mut key = Zeroizing::new([0u8; 32]);
        hkdf.expand(HKDF_INFO, key.as_mut())
            .map_err(|e| Error::Crypto(format!("HKDF expand failed: {}", e)))?;

        Ok(Self { key })
    }

    /// Encrypt and return base64(nonce || ciphertext+tag)
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|_| Error::Crypto("AES key must be 32 bytes".into()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Crypto(format!("AES-256-GCM encryption failed: {}", e)))?;

        let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(packed))
    }

    /// Decrypt an envelope produced by [`VaultCipher::seal`]
    pub fn open(&self, envelope: &str) -> Result<Zeroizing<Vec<u8>>> {
        let packed = STANDARD
            .decode(envelope)
            .map_err(|e| Error::Crypto(format!("Base64 decode failed: {}", e)))?;
        if packed.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|_| Error::Crypto("AES key must be 32 bytes".into()))?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| Error::Crypto("Decryption failed (wrong key or corrupted data)".into()))
    }
}

#[cfg(test)]
pub(crate) fn fast_params() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}
