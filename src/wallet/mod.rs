//! Key custody
//!
//! # Architecture
//!
//! ```text
//! recovery phrase ──derive_wallets──┐
//! hex private key ──────────────────┴──> WalletSet ──encrypt_and_store──> KeyVault ──> KeyValueStore
//!                                           ^                               │
//!                                           └──────verify_and_decrypt───────┘
//! ```
//!
//! # Security
//!
//! - Secrets are zeroed on drop and redacted from `Debug`
//! - The vault persists only ciphertext and an Argon2id password hash
//! - Signers are built per call and never cached

pub mod cipher;
pub mod derivation;
pub mod secret;
pub mod store;
pub mod vault;
pub mod wallet_set;

pub use cipher::{KdfParams, MIN_PASSWORD_LEN};
pub use derivation::{derive_wallets, DEFAULT_WALLET_COUNT};
pub use secret::Secret;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use vault::{KeyVault, SecretRecord};
pub use wallet_set::WalletSet;
