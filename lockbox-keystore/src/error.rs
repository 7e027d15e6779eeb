//! Key store error types.

use lockbox_crypto::CryptoError;
use thiserror::Error;

pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// No secret is stored under the requested slot id.
    #[error("no key stored for slot '{0}'")]
    KeyNotFound(String),

    #[error("key store not initialized")]
    NotInitialized,

    #[error("key store already initialized")]
    AlreadyInitialized,

    #[error("key store is locked")]
    Locked,

    #[error("invalid passphrase")]
    InvalidPassphrase,

    #[error("passphrase too short (min {0} characters)")]
    PassphraseTooShort(usize),

    /// A slot file exists but could not be read back.
    #[error("corrupt slot entry: {0}")]
    Corrupt(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
