//! Object storage contract and an in-memory implementation.

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Non-secret bookkeeping attached to a stored object (owner id, original
/// name). Never holds key material.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Reference to a stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// Full path of the object inside the bucket.
    pub path: String,
    pub size: u64,
}

/// Blob storage the coordinator uploads ciphertext and handed-off copies to.
///
/// Access control is path based and lives in the storage service; nothing
/// here enforces it.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> RemoteResult<ObjectRef>;

    async fn fetch(&self, path: &str) -> RemoteResult<Vec<u8>>;

    /// A URL from which the object can be downloaded directly.
    async fn download_url(&self, path: &str) -> RemoteResult<String>;

    async fn delete(&self, path: &str) -> RemoteResult<()>;
}

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Vec<u8>,
    metadata: ObjectMetadata,
}

/// Object storage held in process memory.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of all stored objects, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub async fn metadata(&self, path: &str) -> Option<ObjectMetadata> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|o| o.metadata.clone())
    }

    /// Replaces the bytes of an existing object in place. Returns false if
    /// there is no such object.
    pub async fn overwrite(&self, path: &str, bytes: Vec<u8>) -> bool {
        match self.objects.write().await.get_mut(path) {
            Some(object) => {
                object.bytes = bytes;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> RemoteResult<ObjectRef> {
        let size = bytes.len() as u64;
        self.objects
            .write()
            .await
            .insert(path.to_string(), StoredObject { bytes, metadata });
        debug!(path, size, "stored object in memory");
        Ok(ObjectRef {
            path: path.to_string(),
            size,
        })
    }

    async fn fetch(&self, path: &str) -> RemoteResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn download_url(&self, path: &str) -> RemoteResult<String> {
        if !self.objects.read().await.contains_key(path) {
            return Err(RemoteError::NotFound(path.to_string()));
        }
        Ok(format!("memory://{path}"))
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.objects
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}
