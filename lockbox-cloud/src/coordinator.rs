//! Publish/open/delete pipelines.
//!
//! Each pipeline is strictly sequential per file: generate key, encrypt,
//! wrap, upload, record (or the reverse for open). Secrets live only inside
//! the synchronous [`seal`] and [`Coordinator::unseal`] scopes; every
//! `.await` happens after they are dropped.
//!
//! Storage and database writes are not transactional. A failure after the
//! upload leaves an orphaned object; the returned error names the slot and
//! stage so it can be reconciled.

use crate::database::{Document, DocumentDatabase, Query};
use crate::error::{CloudError, CloudResult, Stage};
use crate::lifecycle::{FileState, LifecycleTracker};
use crate::progress::{FileProgress, NoopProgress, ProgressSink, ProgressStage};
use crate::storage::{ObjectMetadata, ObjectStorage};
use crate::types::*;
use chrono::Utc;
use futures::future::join_all;
use lockbox_crypto::{
    decode_stored_key, decrypt_content, encode_stored_key, encrypt_content, unwrap_key, wrap_key,
    EnvelopeCiphertext, PublicKey, TagPolicy,
};
use lockbox_keystore::KeyManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates the per-file envelope pipelines for one identity.
pub struct Coordinator {
    pub(crate) identity: Identity,
    pub(crate) keys: KeyManager,
    pub(crate) storage: Arc<dyn ObjectStorage>,
    pub(crate) database: Arc<dyn DocumentDatabase>,
    pub(crate) work_dir: PathBuf,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) lifecycle: LifecycleTracker,
    tag_policy: TagPolicy,
}

/// Output of sealing one file body.
struct SealedFile {
    body: Vec<u8>,
    encrypted_key: String,
}

/// Encrypts `plaintext` under a fresh content key and wraps that key for
/// `public`. The content key does not outlive this call.
fn seal(slot: &str, plaintext: &[u8], public: &PublicKey) -> CloudResult<SealedFile> {
    let (content_key, envelope) =
        encrypt_content(plaintext).map_err(|e| CloudError::crypto(Stage::Encrypt, slot, e))?;
    let wrapped =
        wrap_key(&content_key, public).map_err(|e| CloudError::crypto(Stage::Wrap, slot, e))?;
    let encrypted_key =
        encode_stored_key(&wrapped).map_err(|e| CloudError::crypto(Stage::Wrap, slot, e))?;

    Ok(SealedFile {
        body: envelope.to_bytes(),
        encrypted_key,
    })
}

/// Final path segment of a local file as a string.
pub(crate) fn local_file_name(path: &Path) -> CloudResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CloudError::local(
                &path.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
            )
        })
}

pub(crate) fn decode_document<T: StoredRecord>(doc: Document) -> CloudResult<T> {
    let mut record: T = serde_json::from_value(doc.data)?;
    record.set_id(doc.id);
    Ok(record)
}

impl Coordinator {
    pub fn new(
        identity: Identity,
        keys: KeyManager,
        storage: Arc<dyn ObjectStorage>,
        database: Arc<dyn DocumentDatabase>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identity,
            keys,
            storage,
            database,
            work_dir: work_dir.into(),
            progress: Arc::new(NoopProgress),
            lifecycle: LifecycleTracker::new(),
            tag_policy: TagPolicy::Verify,
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// Decrypts without verifying GCM tags. For recovering damaged files
    /// only; every decrypt logs a warning.
    pub fn with_tag_policy(mut self, policy: TagPolicy) -> Self {
        if policy == TagPolicy::Bypass {
            warn!("coordinator configured to skip authentication tag checks");
        }
        self.tag_policy = policy;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Last known lifecycle state of a slot in this session.
    pub fn file_state(&self, slot: &str) -> Option<FileState> {
        self.lifecycle.state(slot)
    }

    /// Mints the account key pair, stores its private half under
    /// `user:<id>` and publishes the public half to the user directory.
    pub async fn register(&self) -> CloudResult<UserRecord> {
        let slot = self.identity.account_slot();
        let public_key = {
            let pair = self.keys.generate_key_pair();
            self.keys
                .store_private_key(&slot, &pair.private)
                .map_err(|e| CloudError::key_store(Stage::StoreKey, &slot, e))?;
            pair.public.to_hex()
        };

        let mut user = UserRecord {
            id: String::new(),
            email: self.identity.email.clone(),
            public_key,
        };
        self.database
            .set(USERS_COLLECTION, &self.identity.user_id, serde_json::to_value(&user)?)
            .await
            .map_err(|e| CloudError::remote(Stage::Record, &slot, e))?;
        user.set_id(self.identity.user_id.clone());

        info!(user_id = %self.identity.user_id, "registered account key");
        Ok(user)
    }

    /// Encrypts a local file under a fresh key pair (slot = file name),
    /// uploads it to `<fileName>.enc` and records it. The slot's lifecycle
    /// state only changes once the record is written.
    pub async fn publish(&self, plaintext_path: &Path) -> CloudResult<FileRecord> {
        let file_name = local_file_name(plaintext_path)?;
        self.seal_and_upload(plaintext_path, &file_name, &file_name, None, FileState::PlaintextLocal)
            .await
    }

    /// Publishes several files concurrently. Results are in input order.
    pub async fn publish_many(&self, paths: &[PathBuf]) -> Vec<CloudResult<FileRecord>> {
        join_all(paths.iter().map(|p| self.publish(p))).await
    }

    /// Shared tail of `publish` and re-encryption: read, seal, upload,
    /// record. With `doc_id` the record is upserted at that id, otherwise a
    /// new document is inserted.
    pub(crate) async fn seal_and_upload(
        &self,
        plaintext_path: &Path,
        file_name: &str,
        slot: &str,
        doc_id: Option<&str>,
        from: FileState,
    ) -> CloudResult<FileRecord> {
        let mut progress = FileProgress::new(&*self.progress, file_name);
        let result: CloudResult<FileRecord> = async {
            progress.stage(ProgressStage::Encrypting, 0);
            let plaintext = tokio::fs::read(plaintext_path)
                .await
                .map_err(|e| CloudError::local(slot, e))?;

            let (sealed, public_key) = {
                let pair = self.keys.generate_key_pair();
                self.keys
                    .store_private_key(slot, &pair.private)
                    .map_err(|e| CloudError::key_store(Stage::StoreKey, slot, e))?;
                (seal(slot, &plaintext, &pair.public)?, pair.public.to_hex())
            };
            debug!(slot, bytes = plaintext.len(), "sealed file body");

            progress.stage(ProgressStage::Uploading, 30);
            let object_path = encrypted_object_path(file_name);
            let mut metadata = ObjectMetadata::new();
            metadata.insert("userId".into(), self.identity.user_id.clone());
            metadata.insert("originalName".into(), file_name.to_string());
            let object = self
                .storage
                .put(&object_path, sealed.body, metadata)
                .await
                .map_err(|e| CloudError::remote(Stage::Upload, slot, e))?;

            progress.stage(ProgressStage::Recording, 80);
            let mut record = FileRecord {
                id: String::new(),
                user_id: self.identity.user_id.clone(),
                file_name: file_name.to_string(),
                file_path: object.path,
                public_key,
                encrypted_key: sealed.encrypted_key,
                slot_id: Some(slot.to_string()),
                uploaded_at: Utc::now(),
            };
            let id = self.write_file_record(slot, doc_id, &record).await?;
            record.set_id(id);

            if from == FileState::PlaintextLocal {
                // A newly published body restarts the slot's lifecycle.
                self.lifecycle.begin(slot, FileState::PlaintextLocal);
            }
            self.lifecycle
                .transition(slot, from, FileState::EncryptedRemote)?;
            info!(slot, path = %record.file_path, size = object.size, "published file");
            Ok(record)
        }
        .await;
        progress.finish(result)
    }

    async fn write_file_record(
        &self,
        slot: &str,
        doc_id: Option<&str>,
        record: &FileRecord,
    ) -> CloudResult<String> {
        let body = serde_json::to_value(record)?;
        let remote = |e| CloudError::remote(Stage::Record, slot, e);

        let Some(id) = doc_id else {
            return self.database.insert(FILES_COLLECTION, body).await.map_err(remote);
        };

        let existing = self.database.get(FILES_COLLECTION, id).await.map_err(remote)?;
        if existing.is_some() {
            self.database.update(FILES_COLLECTION, id, body).await.map_err(remote)?;
        } else {
            self.database.set(FILES_COLLECTION, id, body).await.map_err(remote)?;
        }
        Ok(id.to_string())
    }

    /// Retrieves the private key for `slot`, opens the wrapped key and
    /// decrypts `body`. The private and content keys are dropped on return.
    pub(crate) fn unseal(
        &self,
        slot: &str,
        body: &[u8],
        encrypted_key: &str,
    ) -> CloudResult<Vec<u8>> {
        let private = self
            .keys
            .retrieve_private_key(slot)
            .map_err(|e| CloudError::key_store(Stage::RetrieveKey, slot, e))?;
        let wrapped =
            decode_stored_key(encrypted_key).map_err(|e| CloudError::crypto(Stage::Unwrap, slot, e))?;
        let content_key =
            unwrap_key(&wrapped, &private).map_err(|e| CloudError::crypto(Stage::Unwrap, slot, e))?;
        let envelope = EnvelopeCiphertext::from_bytes(body)
            .map_err(|e| CloudError::crypto(Stage::Decrypt, slot, e))?;
        decrypt_content(&content_key, &envelope, self.tag_policy)
            .map_err(|e| CloudError::crypto(Stage::Decrypt, slot, e))
    }

    /// Downloads and decrypts `record` into the work dir, returning the path
    /// of the plaintext (`<work_dir>/<name without .enc>`).
    pub async fn open(&self, record: &FileRecord) -> CloudResult<PathBuf> {
        let slot = record.slot();
        let mut progress = FileProgress::new(&*self.progress, &record.file_name);
        let result: CloudResult<PathBuf> = async {
            self.lifecycle
                .check(slot, FileState::EncryptedRemote, FileState::DecryptedLocal)?;

            progress.stage(ProgressStage::Downloading, 10);
            let plaintext = self.download_and_unseal(record, &mut progress).await?;

            let target = self
                .work_dir
                .join(strip_encrypted_suffix(base_name(&record.file_path)));
            tokio::fs::create_dir_all(&self.work_dir)
                .await
                .map_err(|e| CloudError::local(slot, e))?;
            tokio::fs::write(&target, &plaintext)
                .await
                .map_err(|e| CloudError::local(slot, e))?;

            self.lifecycle
                .transition(slot, FileState::EncryptedRemote, FileState::DecryptedLocal)?;
            self.lifecycle
                .transition(slot, FileState::DecryptedLocal, FileState::EncryptedRemote)?;
            info!(slot, path = %target.display(), bytes = plaintext.len(), "opened file");
            Ok(target)
        }
        .await;
        progress.finish(result)
    }

    pub(crate) async fn download_and_unseal(
        &self,
        record: &FileRecord,
        progress: &mut FileProgress<'_>,
    ) -> CloudResult<Vec<u8>> {
        let slot = record.slot();
        let body = self
            .storage
            .fetch(&record.file_path)
            .await
            .map_err(|e| CloudError::remote(Stage::Download, slot, e))?;
        debug!(slot, bytes = body.len(), "downloaded ciphertext");

        progress.stage(ProgressStage::Decrypting, 60);
        self.unseal(slot, &body, &record.encrypted_key)
    }

    /// Removes the ciphertext and the record. The private key stays in the
    /// secret store.
    pub async fn delete(&self, record: &FileRecord) -> CloudResult<()> {
        let slot = record.slot();
        self.storage
            .delete(&record.file_path)
            .await
            .map_err(|e| CloudError::remote(Stage::Delete, slot, e))?;
        self.database
            .delete(FILES_COLLECTION, &record.id)
            .await
            .map_err(|e| CloudError::remote(Stage::Record, slot, e))?;

        self.lifecycle.forget(slot);
        info!(slot, path = %record.file_path, "deleted file");
        Ok(())
    }

    /// The caller's file records.
    pub async fn list_files(&self) -> CloudResult<Vec<FileRecord>> {
        let query = Query::new().eq("userId", self.identity.user_id.as_str());
        let docs = self
            .database
            .query(FILES_COLLECTION, &query)
            .await
            .map_err(|e| CloudError::remote(Stage::LookupRecord, &self.identity.user_id, e))?;
        docs.into_iter().map(decode_document::<FileRecord>).collect()
    }

    pub async fn get_file(&self, id: &str) -> CloudResult<FileRecord> {
        let doc = self
            .database
            .get(FILES_COLLECTION, id)
            .await
            .map_err(|e| CloudError::remote(Stage::LookupRecord, id, e))?
            .ok_or_else(|| CloudError::NotFound(format!("{FILES_COLLECTION}/{id}")))?;
        decode_document(doc)
    }

    /// Direct download URL for the record's ciphertext.
    pub async fn download_url(&self, record: &FileRecord) -> CloudResult<String> {
        self.storage
            .download_url(&record.file_path)
            .await
            .map_err(|e| CloudError::remote(Stage::Download, record.slot(), e))
    }
}
