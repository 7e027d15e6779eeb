//! Coordinator and collaborator error types.

use crate::lifecycle::FileState;
use lockbox_crypto::CryptoError;
use lockbox_keystore::KeyStoreError;
use std::fmt;
use thiserror::Error;

/// Result type for coordinator operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Result type for object storage and document database calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The pipeline step an error occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    StoreKey,
    RetrieveKey,
    Encrypt,
    Wrap,
    Upload,
    Record,
    LookupRecord,
    LookupRecipient,
    Download,
    Unwrap,
    Decrypt,
    HandOff,
    Delete,
    LocalFile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StoreKey => "store-key",
            Stage::RetrieveKey => "retrieve-key",
            Stage::Encrypt => "encrypt",
            Stage::Wrap => "wrap",
            Stage::Upload => "upload",
            Stage::Record => "record",
            Stage::LookupRecord => "lookup-record",
            Stage::LookupRecipient => "lookup-recipient",
            Stage::Download => "download",
            Stage::Unwrap => "unwrap",
            Stage::Decrypt => "decrypt",
            Stage::HandOff => "hand-off",
            Stage::Delete => "delete",
            Stage::LocalFile => "local-file",
        };
        f.write_str(name)
    }
}

/// Failures reported by the object storage and document database collaborators.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("S3 operation failed: {0}")]
    S3(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the coordinator.
///
/// Contextual variants carry the slot id and [`Stage`] so that partially
/// completed operations can be reconciled. None of them carry key material
/// or plaintext.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("no private key at {stage} for slot '{slot_id}'")]
    KeyNotFound { slot_id: String, stage: Stage },

    #[error("crypto failure at {stage} for slot '{slot_id}': {source}")]
    Crypto {
        slot_id: String,
        stage: Stage,
        #[source]
        source: CryptoError,
    },

    #[error("key store failure at {stage} for slot '{slot_id}': {source}")]
    KeyStore {
        slot_id: String,
        stage: Stage,
        #[source]
        source: KeyStoreError,
    },

    #[error("remote I/O failure at {stage} for slot '{slot_id}': {source}")]
    RemoteIo {
        stage: Stage,
        slot_id: String,
        #[source]
        source: RemoteError,
    },

    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("file is already encrypted: {0}")]
    AlreadyEncrypted(String),

    #[error("invalid state transition for slot '{slot_id}': {from} -> {to}")]
    InvalidTransition {
        slot_id: String,
        from: FileState,
        to: FileState,
    },

    /// Reading, writing or renaming a file in the local file system.
    #[error("local file failure at {stage} for slot '{slot_id}': {source}")]
    LocalIo {
        slot_id: String,
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CloudError {
    pub(crate) fn crypto(stage: Stage, slot_id: &str, source: CryptoError) -> Self {
        CloudError::Crypto {
            slot_id: slot_id.to_string(),
            stage,
            source,
        }
    }

    pub(crate) fn remote(stage: Stage, slot_id: &str, source: RemoteError) -> Self {
        CloudError::RemoteIo {
            stage,
            slot_id: slot_id.to_string(),
            source,
        }
    }

    /// A secret store miss becomes [`CloudError::KeyNotFound`]; anything else
    /// is wrapped with its slot id.
    pub(crate) fn key_store(stage: Stage, slot_id: &str, source: KeyStoreError) -> Self {
        match source {
            KeyStoreError::KeyNotFound(_) => CloudError::KeyNotFound {
                slot_id: slot_id.to_string(),
                stage,
            },
            source => CloudError::KeyStore {
                slot_id: slot_id.to_string(),
                stage,
                source,
            },
        }
    }

    pub(crate) fn local(slot_id: &str, source: std::io::Error) -> Self {
        CloudError::LocalIo {
            slot_id: slot_id.to_string(),
            stage: Stage::LocalFile,
            source,
        }
    }

    /// The underlying crypto error, if this failure came from the crypto layer.
    pub fn crypto_source(&self) -> Option<&CryptoError> {
        match self {
            CloudError::Crypto { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The pipeline stage, for contextual variants.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CloudError::Crypto { stage, .. }
            | CloudError::RemoteIo { stage, .. }
            | CloudError::KeyNotFound { stage, .. }
            | CloudError::KeyStore { stage, .. }
            | CloudError::LocalIo { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
