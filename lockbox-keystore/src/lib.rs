//! Private key custody for lockbox.
//!
//! Private keys are stored per protected file under an opaque slot id chosen
//! by the caller, never under a user identity. [`KeyManager`] is the entry
//! point; it delegates persistence to a [`SecretStore`]:
//!
//! - [`MemorySecretStore`] keeps secrets in process memory.
//! - [`FileSecretStore`] keeps one encrypted file per slot in a directory,
//!   unlocked with a passphrase (Argon2id + ChaCha20-Poly1305).

mod error;
mod file;
mod manager;
mod memory;
mod store;

pub use error::{KeyStoreError, KeyStoreResult};
pub use file::{FileSecretStore, MIN_PASSPHRASE_LEN};
pub use manager::KeyManager;
pub use memory::MemorySecretStore;
pub use store::SecretStore;
