//! Error types for the swap agent

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the swap agent
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Input and output token must differ (both are {0})")]
    SameToken(String),

    #[error("{0} must be greater than zero")]
    NonPositive(&'static str),

    #[error("Password too weak: must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Invalid recovery phrase: {0}")]
    InvalidPhrase(String),

    #[error("Invalid secret key: {0}")]
    InvalidSecret(String),

    #[error("Secret for {0} is already in the wallet set")]
    DuplicateSecret(String),

    #[error("Unknown or disabled token: {0}")]
    UnknownToken(String),

    #[error("Forward target {0} is one of the rotating wallets")]
    ForwardTargetInRotation(String),

    #[error("At least one wallet is required")]
    NoWallets,

    // Custody errors
    #[error("Wrong password")]
    WrongPassword,

    #[error("No stored secret could be decrypted")]
    NoDecryptableSecrets,

    #[error("Vault is empty: no encrypted secrets stored")]
    VaultEmpty,

    #[error("Vault storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    // Network and execution errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: String, required: String },

    #[error("Quote failed: {0}")]
    Quote(String),

    #[error("Approval failed: {0}")]
    Approval(String),

    #[error("Swap failed: {0}")]
    Swap(String),

    #[error("Transaction {0} reverted")]
    TransactionReverted(String),

    #[error("No output detected after swap (balance delta was {0})")]
    NoOutputDetected(String),

    // Forward errors
    #[error("Forward transfer failed: {0}")]
    Forward(String),

    // Lifecycle errors
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Internal error: {0}")]
    Internal(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Check if this error is retryable (transient, read-only)
    ///
    /// Only plain RPC failures qualify. Anything that moved or could have
    /// moved capital is never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Rpc(_))
    }

    /// Check if this error was raised by input validation
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::InvalidAddress(_)
                | Error::SameToken(_)
                | Error::NonPositive(_)
                | Error::WeakPassword { .. }
                | Error::InvalidPhrase(_)
                | Error::InvalidSecret(_)
                | Error::DuplicateSecret(_)
                | Error::UnknownToken(_)
                | Error::ForwardTargetInRotation(_)
                | Error::NoWallets
        )
    }

    /// Check if this error concerns key custody
    pub fn is_custody(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword
                | Error::NoDecryptableSecrets
                | Error::VaultEmpty
                | Error::Storage(_)
                | Error::Crypto(_)
        )
    }

    /// Check if this error is fatal to a running swap sequence
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            Error::Rpc(_)
                | Error::InsufficientBalance { .. }
                | Error::Quote(_)
                | Error::Approval(_)
                | Error::Swap(_)
                | Error::TransactionReverted(_)
                | Error::NoOutputDetected(_)
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_disjoint() {
        let errors = [
            Error::SameToken("USDC".into()),
            Error::WrongPassword,
            Error::NoOutputDetected("0".into()),
            Error::Forward("reverted".into()),
        ];

        for e in &errors {
            let groups = [e.is_configuration(), e.is_custody(), e.is_execution()];
            assert!(groups.iter().filter(|g| **g).count() <= 1, "{e} in several groups");
        }

        // Forward failures are reported but never fatal
        assert!(!Error::Forward("x".into()).is_execution());
    }

    #[test]
    fn test_only_rpc_is_retryable() {
        assert!(Error::Rpc("timeout".into()).is_retryable());
        assert!(!Error::Swap("reverted".into()).is_retryable());
        assert!(!Error::Approval("nonce".into()).is_retryable());
    }
}
