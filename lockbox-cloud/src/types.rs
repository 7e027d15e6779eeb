//! Records, identities and storage path conventions.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Collection holding one [`FileRecord`] per published file.
pub const FILES_COLLECTION: &str = "files";
/// Collection holding one [`ShareRecord`] per hand-off.
pub const SHARED_FILES_COLLECTION: &str = "sharedFiles";
/// Collection holding one [`UserRecord`] per registered account, keyed by user id.
pub const USERS_COLLECTION: &str = "Users";

/// Suffix of every published ciphertext object.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// The caller, as asserted by the external authentication provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    /// Slot id of the account-level key pair minted by `register`.
    pub fn account_slot(&self) -> String {
        format!("user:{}", self.user_id)
    }

    /// Prefix prepended to re-encrypted shared files: the first two
    /// characters of the user id.
    pub fn short_prefix(&self) -> String {
        let prefix: String = self.user_id.chars().take(2).collect();
        if prefix.is_empty() {
            "xx".to_string()
        } else {
            prefix
        }
    }
}

/// Durable record tying a stored ciphertext to the material needed to open it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Document id in [`FILES_COLLECTION`]. Not part of the stored body.
    #[serde(skip)]
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    /// Object storage path of the ciphertext.
    pub file_path: String,
    /// Hex-encoded uncompressed secp256k1 public key of this file's key pair.
    pub public_key: String,
    /// Wrapped content key, usually inside the metadata envelope.
    pub encrypted_key: String,
    /// Secret store slot of the private key. Older records omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    /// The slot holding this file's private key, falling back to the file
    /// name for records written without one.
    pub fn slot(&self) -> &str {
        self.slot_id.as_deref().unwrap_or(&self.file_name)
    }
}

/// A plaintext copy handed off to another identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRecord {
    #[serde(skip)]
    pub id: String,
    pub file_name: String,
    /// Object storage path of the plaintext copy, under the recipient's email.
    pub file_path: String,
    /// User id of the sharer.
    pub shared_by: String,
    pub shared_at: DateTime<Utc>,
}

/// Public directory entry for a registered account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(skip)]
    pub id: String,
    pub email: String,
    pub public_key: String,
}

/// A record stored as a document body, with its id kept out-of-band.
pub(crate) trait StoredRecord: Serialize + DeserializeOwned {
    fn set_id(&mut self, id: String);
}

macro_rules! stored_record {
    ($($ty:ty),*) => {
        $(impl StoredRecord for $ty {
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        })*
    };
}

stored_record!(FileRecord, ShareRecord, UserRecord);

/// Last path segment of an object path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `name` without a trailing `.enc`.
pub fn strip_encrypted_suffix(name: &str) -> &str {
    name.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(name)
}

/// Object path of a published ciphertext: `<fileName>.enc`.
pub fn encrypted_object_path(file_name: &str) -> String {
    format!("{file_name}{ENCRYPTED_SUFFIX}")
}

/// Object path of a handed-off plaintext copy:
/// `<recipientEmail>/<basename of source without .enc>`.
pub fn shared_object_path(recipient_email: &str, source_path: &str) -> String {
    format!(
        "{recipient_email}/{}",
        strip_encrypted_suffix(base_name(source_path))
    )
}

/// Half-open `[lower, upper)` range covering exactly the object paths that
/// start with `<email>/`. `'0'` is the code point right after `'/'`.
pub fn shared_namespace_bounds(email: &str) -> (String, String) {
    (format!("{email}/"), format!("{email}0"))
}
