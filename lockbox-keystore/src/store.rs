use crate::error::KeyStoreResult;
use zeroize::Zeroizing;

/// Keyed custody of secret bytes.
///
/// Slot ids are opaque and chosen by the caller, one per protected file.
/// `set` overwrites any previous entry for the same slot as a single atomic
/// replacement; a reader never observes a half-written entry.
pub trait SecretStore: Send + Sync {
    fn set(&self, slot: &str, secret: &[u8]) -> KeyStoreResult<()>;

    fn get(&self, slot: &str) -> KeyStoreResult<Option<Zeroizing<Vec<u8>>>>;

    fn contains(&self, slot: &str) -> KeyStoreResult<bool> {
        Ok(self.get(slot)?.is_some())
    }

    /// All slot ids currently held, in no particular order.
    fn slots(&self) -> KeyStoreResult<Vec<String>>;
}
