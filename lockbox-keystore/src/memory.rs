use crate::error::KeyStoreResult;
use crate::store::SecretStore;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use zeroize::Zeroizing;

/// Process-local secret store. Contents vanish with the process.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Zeroizing<Vec<u8>>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn set(&self, slot: &str, secret: &[u8]) -> KeyStoreResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(slot.to_string(), Zeroizing::new(secret.to_vec()));
        Ok(())
    }

    fn get(&self, slot: &str) -> KeyStoreResult<Option<Zeroizing<Vec<u8>>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(slot).cloned())
    }

    fn contains(&self, slot: &str) -> KeyStoreResult<bool> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.contains_key(slot))
    }

    fn slots(&self) -> KeyStoreResult<Vec<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites() {
        let store = MemorySecretStore::new();
        store.set("a", b"one").unwrap();
        store.set("a", b"two").unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().as_slice(), b"two");
        assert_eq!(store.slots().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn missing_slot_is_none() {
        let store = MemorySecretStore::new();
        assert!(store.get("nope").unwrap().is_none());
        assert!(!store.contains("nope").unwrap());
    }
}
