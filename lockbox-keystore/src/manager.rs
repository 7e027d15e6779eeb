use crate::error::{KeyStoreError, KeyStoreResult};
use crate::store::SecretStore;
use lockbox_crypto::{generate_key_pair, KeyPair, PrivateKey};
use std::sync::Arc;
use tracing::debug;

/// Mints per-file key pairs and keeps their private halves in a
/// [`SecretStore`], addressed by slot id.
///
/// Losing the underlying store loses access to every file whose key lives
/// in it. Entries are never reclaimed; storing under an existing slot
/// replaces the previous key.
#[derive(Clone)]
pub struct KeyManager {
    store: Arc<dyn SecretStore>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Generates a key pair without persisting anything.
    pub fn generate_key_pair(&self) -> KeyPair {
        generate_key_pair()
    }

    pub fn store_private_key(&self, slot: &str, key: &PrivateKey) -> KeyStoreResult<()> {
        self.store.set(slot, key.to_bytes().as_ref())?;
        debug!(slot, "stored private key");
        Ok(())
    }

    pub fn retrieve_private_key(&self, slot: &str) -> KeyStoreResult<PrivateKey> {
        let bytes = self
            .store
            .get(slot)?
            .ok_or_else(|| KeyStoreError::KeyNotFound(slot.to_string()))?;
        let key = PrivateKey::from_bytes(&bytes)
            .map_err(|e| KeyStoreError::Corrupt(format!("slot '{slot}': {e}")))?;
        debug!(slot, "retrieved private key");
        Ok(key)
    }

    pub fn has_key(&self, slot: &str) -> KeyStoreResult<bool> {
        self.store.contains(slot)
    }

    pub fn store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySecretStore;

    fn manager() -> KeyManager {
        KeyManager::new(Arc::new(MemorySecretStore::new()))
    }

    #[test]
    fn store_then_retrieve() {
        let km = manager();
        let kp = km.generate_key_pair();
        km.store_private_key("hello.txt", &kp.private).unwrap();
        let restored = km.retrieve_private_key("hello.txt").unwrap();
        assert_eq!(restored.public_key(), kp.public);
        assert!(km.has_key("hello.txt").unwrap());
    }

    #[test]
    fn unknown_slot_is_key_not_found() {
        let err = manager().retrieve_private_key("missing").unwrap_err();
        assert!(matches!(err, KeyStoreError::KeyNotFound(ref s) if s == "missing"));
    }

    #[test]
    fn overwrite_replaces_key() {
        let km = manager();
        let first = km.generate_key_pair();
        let second = km.generate_key_pair();
        km.store_private_key("slot", &first.private).unwrap();
        km.store_private_key("slot", &second.private).unwrap();
        assert_eq!(km.retrieve_private_key("slot").unwrap().public_key(), second.public);
    }

    #[test]
    fn garbage_secret_is_corrupt() {
        let km = manager();
        km.store().set("bad", b"not a scalar").unwrap();
        assert!(matches!(
            km.retrieve_private_key("bad"),
            Err(KeyStoreError::Corrupt(_))
        ));
    }
}
