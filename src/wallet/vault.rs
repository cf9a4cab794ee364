//! Password-protected storage of wallet secrets
//!
//! Two entries live in the backing store:
//! - `swapbot-password-hash`: Argon2id PHC string used to check the password
//! - `swapbot-encrypted-pks`: JSON keyring with the KDF salt, cost
//!   parameters and one AES-GCM envelope per secret
//!
//! Plaintext secrets never reach the store. A record that no longer decrypts
//! is skipped with a warning so one corrupt entry cannot lock out the rest.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::wallet::cipher::{self, KdfParams, VaultCipher};
use crate::wallet::secret::Secret;
use crate::wallet::store::KeyValueStore;

pub const ENCRYPTED_KEYS_KEY: &str = "swapbot-encrypted-pks";
pub const PASSWORD_HASH_KEY: &str = "swapbot-password-hash";

const KEYRING_VERSION: u32 = 1;

/// One encrypted secret as persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretRecord {
    /// base64(nonce || AES-256-GCM ciphertext)
    pub ciphertext: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncryptedKeyring {
    version: u32,
    kdf: KdfParams,
    salt: String,
    records: Vec<SecretRecord>,
}

/// Encrypted, password-gated store of wallet secrets
pub struct KeyVault {
    store: Mutex<Box<dyn KeyValueStore>>,
    kdf: KdfParams,
}

impl KeyVault {
    /// Create a vault over the given store
    ///
    /// `kdf` applies to newly written keyrings; existing ones are read with
    /// the parameters they were written with.
    pub fn new(store: impl KeyValueStore + 'static, kdf: KdfParams) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
            kdf,
        }
    }

    /// Encrypt every secret under `password` and replace the stored set
    ///
    /// A fresh salt is drawn on every call, so the stored set is always a
    /// single keyring under a single password.
    pub async fn encrypt_and_store(&self, secrets: &[Secret], password: &str) -> Result<()> {
        cipher::check_password_strength(password)?;
        if secrets.is_empty() {
            return Err(Error::NoWallets);
        }

        let salt = cipher::random_salt();
        let vault_cipher = VaultCipher::derive(password, &salt, &self.kdf)?;
        let records = secrets
            .iter()
            .map(|secret| {
                vault_cipher
                    .seal(secret.to_hex().as_bytes())
                    .map(|ciphertext| SecretRecord { ciphertext })
            })
            .collect::<Result<Vec<_>>>()?;

        let keyring = EncryptedKeyring {
            version: KEYRING_VERSION,
            kdf: self.kdf,
            salt: STANDARD.encode(salt),
            records,
        };
        let password_hash = cipher::hash_password(password, &self.kdf)?;

        // Hash and keyring must never disagree, so they land in one write
        let keyring_json = serde_json::to_string(&keyring)?;
        self.store.lock().await.put_many(vec![
            (ENCRYPTED_KEYS_KEY, keyring_json),
            (PASSWORD_HASH_KEY, password_hash),
        ])?;

        info!("Stored {} encrypted secret(s)", keyring.records.len());
        Ok(())
    }

    /// Check the password and decrypt every readable secret
    pub async fn verify_and_decrypt(&self, password: &str) -> Result<Vec<Secret>> {
        let store = self.store.lock().await;
        let (Some(password_hash), Some(keyring_json)) =
            (store.get(PASSWORD_HASH_KEY)?, store.get(ENCRYPTED_KEYS_KEY)?)
        else {
            return Err(Error::VaultEmpty);
        };
        drop(store);

        if !cipher::verify_password(password, &password_hash)? {
            warn!("Vault unlock rejected: wrong password");
            return Err(Error::WrongPassword);
        }

        let keyring: EncryptedKeyring = serde_json::from_str(&keyring_json)
            .map_err(|e| Error::Storage(format!("Keyring is unreadable: {}", e)))?;
        if keyring.version != KEYRING_VERSION {
            return Err(Error::Storage(format!(
                "Unsupported keyring version {}",
                keyring.version
            )));
        }
        let salt = STANDARD
            .decode(&keyring.salt)
            .map_err(|e| Error::Storage(format!("Keyring salt is not base64: {}", e)))?;
        let vault_cipher = VaultCipher::derive(password, &salt, &keyring.kdf)?;

        let mut secrets = Vec::with_capacity(keyring.records.len());
        for (index, record) in keyring.records.iter().enumerate() {
            match Self::open_record(&vault_cipher, record) {
                Ok(secret) => secrets.push(secret),
                Err(e) => warn!("Skipping stored secret #{}: {}", index, e),
            }
        }

        if secrets.is_empty() {
            return Err(Error::NoDecryptableSecrets);
        }

        debug!(
            "Decrypted {}/{} stored secret(s)",
            secrets.len(),
            keyring.records.len()
        );
        Ok(secrets)
    }

    fn open_record(vault_cipher: &VaultCipher, record: &SecretRecord) -> Result<Secret> {
        let plaintext = vault_cipher.open(&record.ciphertext)?;
        let hex = std::str::from_utf8(&plaintext)
            .map_err(|_| Error::Crypto("Decrypted secret is not UTF-8".into()))?;
        Secret::from_hex(hex)
    }

    /// Remove all stored secrets and the password hash
    pub async fn clear(&self) -> Result<()> {
        self.store
            .lock()
            .await
            .remove_many(&[ENCRYPTED_KEYS_KEY, PASSWORD_HASH_KEY])?;
        info!("Vault cleared");
        Ok(())
    }

    /// Whether a password has been set
    pub async fn is_initialized(&self) -> Result<bool> {
        let store = self.store.lock().await;
        Ok(store.get(PASSWORD_HASH_KEY)?.is_some())
    }

    /// Number of stored records, readable without the password
    pub async fn record_count(&self) -> Result<usize> {
        let store = self.store.lock().await;
        match store.get(ENCRYPTED_KEYS_KEY)? {
            Some(json) => {
                let keyring: EncryptedKeyring = serde_json::from_str(&json)
                    .map_err(|e| Error::Storage(format!("Keyring is unreadable: {}", e)))?;
                Ok(keyring.records.len())
            }
            None => Ok(0),
        }
    }
}
