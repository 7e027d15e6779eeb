//! Shared test helpers: in-memory collaborators shared between identities.

#![allow(dead_code)]

use lockbox_cloud::{
    Coordinator, FnProgress, Identity, MemoryDocumentDatabase, MemoryObjectStorage, ProgressEvent,
};
use lockbox_keystore::{KeyManager, MemorySecretStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// One storage bucket and one database, shared by every identity created
/// from it.
pub struct TestWorld {
    pub storage: Arc<MemoryObjectStorage>,
    pub database: Arc<MemoryDocumentDatabase>,
    pub root: TempDir,
}

/// An identity with its own secret store and work dir.
pub struct TestUser {
    pub coordinator: Coordinator,
    pub events: Arc<Mutex<Vec<ProgressEvent>>>,
    pub inbox_dir: PathBuf,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MemoryObjectStorage::new()),
            database: Arc::new(MemoryDocumentDatabase::new()),
            root: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn user(&self, user_id: &str, email: &str) -> TestUser {
        let work_dir = self.root.path().join(user_id).join("work");
        let inbox_dir = self.root.path().join(user_id).join("inbox");
        std::fs::create_dir_all(&inbox_dir).expect("inbox dir");

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let sink = FnProgress(move |e: ProgressEvent| sink_events.lock().unwrap().push(e));

        let coordinator = Coordinator::new(
            Identity::new(user_id, email),
            KeyManager::new(Arc::new(MemorySecretStore::new())),
            self.storage.clone(),
            self.database.clone(),
            work_dir,
        )
        .with_progress(Arc::new(sink));

        TestUser {
            coordinator,
            events,
            inbox_dir,
        }
    }
}

impl TestUser {
    /// Writes a local plaintext file for publishing.
    pub fn write_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.inbox_dir.join(name);
        std::fs::write(&path, contents).expect("write plaintext");
        path
    }

    pub fn events_for(&self, file_name: &str) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.file_name == file_name)
            .cloned()
            .collect()
    }
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("read file")
}
