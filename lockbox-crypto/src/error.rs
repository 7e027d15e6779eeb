//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in the encryption layer.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The AEAD tag of an encrypted file body did not verify.
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// Structural decode failure (too short, wrong field widths, bad encoding).
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The MAC of a wrapped key did not verify (wrong private key or tampered data).
    #[error("wrapped key integrity check failed")]
    WrapIntegrityFailure,

    /// The wrapped key opened but did not yield a usable content key.
    #[error("unwrapped key mismatch: {0}")]
    KeyMismatch(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CryptoError {
    fn from(e: serde_json::Error) -> Self {
        CryptoError::Serialization(e.to_string())
    }
}
