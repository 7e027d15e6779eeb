//! Passphrase-protected, directory-backed secret store.
//!
//! Layout of the store directory:
//!
//! ```text
//! keystore.json             salt, KDF parameters, verification token
//! <sha256(slot) hex>.slot   one sealed secret per slot
//! ```
//!
//! The store key is derived from the passphrase with Argon2id and held in
//! memory only while unlocked. Every slot secret is sealed individually with
//! ChaCha20-Poly1305 under that key.

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::store::SecretStore;
use lockbox_crypto::{decrypt, derive_key, encrypt, DerivedKey, EncryptedData, KdfParams, Salt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Minimum passphrase length accepted by [`FileSecretStore::initialize`].
pub const MIN_PASSPHRASE_LEN: usize = 8;

const HEADER_FILE: &str = "keystore.json";
const SLOT_EXTENSION: &str = "slot";
const VERIFICATION_PLAINTEXT: &[u8] = b"lockbox-keystore-verification-token-v1";

#[derive(Serialize, Deserialize)]
struct StoreHeader {
    salt: Salt,
    kdf: KdfParams,
    verification: EncryptedData,
}

#[derive(Serialize, Deserialize)]
struct SlotEntry {
    slot: String,
    sealed: EncryptedData,
}

pub struct FileSecretStore {
    dir: PathBuf,
    kdf: KdfParams,
    key: RwLock<Option<DerivedKey>>,
}

impl FileSecretStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    /// The store starts locked.
    pub fn open(dir: impl Into<PathBuf>) -> KeyStoreResult<Self> {
        Self::with_kdf_params(dir, KdfParams::default())
    }

    /// Like [`open`](Self::open) but with explicit Argon2id costs for new
    /// stores. Existing stores always use the costs recorded in their header.
    pub fn with_kdf_params(dir: impl Into<PathBuf>, kdf: KdfParams) -> KeyStoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            kdf,
            key: RwLock::new(None),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_initialized(&self) -> bool {
        self.header_path().exists()
    }

    pub fn is_unlocked(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// First-time setup. Leaves the store unlocked.
    pub fn initialize(&self, passphrase: &str) -> KeyStoreResult<()> {
        if passphrase.chars().count() < MIN_PASSPHRASE_LEN {
            return Err(KeyStoreError::PassphraseTooShort(MIN_PASSPHRASE_LEN));
        }
        if self.is_initialized() {
            return Err(KeyStoreError::AlreadyInitialized);
        }

        let salt = Salt::random();
        let key = derive_key(passphrase, &salt, &self.kdf)?;
        let header = StoreHeader {
            salt,
            kdf: self.kdf,
            verification: encrypt(&key, VERIFICATION_PLAINTEXT)?,
        };
        self.write_atomic(&self.header_path(), &serde_json::to_vec_pretty(&header)?)?;

        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
        info!(dir = %self.dir.display(), "initialized key store");
        Ok(())
    }

    pub fn unlock(&self, passphrase: &str) -> KeyStoreResult<()> {
        let header = self.read_header()?;
        let key = derive_key(passphrase, &header.salt, &header.kdf)?;

        let token =
            decrypt(&key, &header.verification).map_err(|_| KeyStoreError::InvalidPassphrase)?;
        if token != VERIFICATION_PLAINTEXT {
            return Err(KeyStoreError::InvalidPassphrase);
        }

        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
        debug!(dir = %self.dir.display(), "unlocked key store");
        Ok(())
    }

    /// Clears the store key from memory.
    pub fn lock(&self) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn header_path(&self) -> PathBuf {
        self.dir.join(HEADER_FILE)
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        let digest = Sha256::digest(slot.as_bytes());
        self.dir
            .join(format!("{}.{SLOT_EXTENSION}", hex::encode(digest)))
    }

    fn read_header(&self) -> KeyStoreResult<StoreHeader> {
        let bytes = match fs::read(self.header_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(KeyStoreError::NotInitialized);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn current_key(&self) -> KeyStoreResult<DerivedKey> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(KeyStoreError::Locked)
    }

    /// Writes through a temp file in the same directory, then renames over
    /// `target`.
    fn write_atomic(&self, target: &Path, bytes: &[u8]) -> KeyStoreResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| KeyStoreError::Io(e.error))?;
        Ok(())
    }

    fn read_entry(&self, path: &Path) -> KeyStoreResult<Option<SlotEntry>> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| KeyStoreError::Corrupt(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn set(&self, slot: &str, secret: &[u8]) -> KeyStoreResult<()> {
        let key = self.current_key()?;
        let entry = SlotEntry {
            slot: slot.to_string(),
            sealed: encrypt(&key, secret)?,
        };
        self.write_atomic(&self.slot_path(slot), &serde_json::to_vec(&entry)?)?;
        debug!(slot, "stored secret");
        Ok(())
    }

    fn get(&self, slot: &str) -> KeyStoreResult<Option<Zeroizing<Vec<u8>>>> {
        let key = self.current_key()?;
        let Some(entry) = self.read_entry(&self.slot_path(slot))? else {
            return Ok(None);
        };
        if entry.slot != slot {
            return Err(KeyStoreError::Corrupt(format!(
                "slot file for '{slot}' belongs to '{}'",
                entry.slot
            )));
        }
        let secret = decrypt(&key, &entry.sealed)
            .map_err(|e| KeyStoreError::Corrupt(format!("slot '{slot}': {e}")))?;
        Ok(Some(Zeroizing::new(secret)))
    }

    fn contains(&self, slot: &str) -> KeyStoreResult<bool> {
        self.current_key()?;
        Ok(self.slot_path(slot).exists())
    }

    fn slots(&self) -> KeyStoreResult<Vec<String>> {
        self.current_key()?;
        let mut slots = Vec::new();
        for dirent in fs::read_dir(&self.dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SLOT_EXTENSION) {
                continue;
            }
            if let Some(entry) = self.read_entry(&path)? {
                slots.push(entry.slot);
            }
        }
        Ok(slots)
    }
}
