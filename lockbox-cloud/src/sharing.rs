//! Cross-identity sharing.
//!
//! Sharing hands off **plaintext**: the owner decrypts with their own key and
//! uploads the cleartext under `<recipientEmail>/<name>`. The copy is
//! protected only by the storage service's path-based rules. The recipient
//! then pulls it and re-encrypts it under a key pair of their own, which
//! deletes the remote plaintext.

use crate::coordinator::{decode_document, local_file_name, Coordinator};
use crate::database::Query;
use crate::error::{CloudError, CloudResult, Stage};
use crate::lifecycle::FileState;
use crate::progress::{FileProgress, ProgressStage};
use crate::storage::ObjectMetadata;
use crate::types::*;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

impl Coordinator {
    /// Finds a registered account by email.
    pub async fn lookup_recipient(&self, email: &str) -> CloudResult<UserRecord> {
        let query = Query::new().eq("email", email);
        let doc = self
            .database
            .query(USERS_COLLECTION, &query)
            .await
            .map_err(|e| CloudError::remote(Stage::LookupRecipient, email, e))?
            .into_iter()
            .next()
            .ok_or_else(|| CloudError::RecipientNotFound(email.to_string()))?;
        decode_document(doc)
    }

    /// Decrypts `record` with the owner's key and hands the plaintext off to
    /// `recipient_email`'s storage namespace.
    pub async fn share(&self, record: &FileRecord, recipient_email: &str) -> CloudResult<ShareRecord> {
        let recipient = self.lookup_recipient(recipient_email).await?;
        let slot = record.slot();

        let mut progress = FileProgress::new(&*self.progress, &record.file_name);
        let result: CloudResult<ShareRecord> = async {
            self.lifecycle
                .check(slot, FileState::EncryptedRemote, FileState::DecryptedLocal)?;

            progress.stage(ProgressStage::Downloading, 10);
            let plaintext = self.download_and_unseal(record, &mut progress).await?;
            self.lifecycle
                .transition(slot, FileState::EncryptedRemote, FileState::DecryptedLocal)?;
            // The owner's ciphertext stays where it was.
            self.lifecycle
                .transition(slot, FileState::DecryptedLocal, FileState::EncryptedRemote)?;

            progress.stage(ProgressStage::HandingOff, 70);
            let share_path = shared_object_path(&recipient.email, &record.file_path);
            let mut metadata = ObjectMetadata::new();
            metadata.insert("sharedBy".into(), self.identity.user_id.clone());
            metadata.insert("originalName".into(), record.file_name.clone());
            let object = self
                .storage
                .put(&share_path, plaintext, metadata)
                .await
                .map_err(|e| CloudError::remote(Stage::HandOff, slot, e))?;

            progress.stage(ProgressStage::Recording, 90);
            let mut share = ShareRecord {
                id: String::new(),
                file_name: strip_encrypted_suffix(base_name(&record.file_path)).to_string(),
                file_path: object.path,
                shared_by: self.identity.user_id.clone(),
                shared_at: Utc::now(),
            };
            let id = self
                .database
                .insert(SHARED_FILES_COLLECTION, serde_json::to_value(&share)?)
                .await
                .map_err(|e| CloudError::remote(Stage::Record, slot, e))?;
            share.set_id(id);

            self.lifecycle.begin(&share.id, FileState::DecryptedLocal);
            self.lifecycle
                .transition(&share.id, FileState::DecryptedLocal, FileState::HandedOffRemote)?;

            info!(
                slot,
                share_id = %share.id,
                path = %share.file_path,
                "handed off plaintext copy"
            );
            Ok(share)
        }
        .await;
        progress.finish(result)
    }

    /// Share records in the caller's namespace (`<email>/...`).
    pub async fn shared_with_me(&self) -> CloudResult<Vec<ShareRecord>> {
        let (lower, upper) = shared_namespace_bounds(&self.identity.email);
        let query = Query::new()
            .gte("filePath", lower)
            .lt("filePath", upper);
        let docs = self
            .database
            .query(SHARED_FILES_COLLECTION, &query)
            .await
            .map_err(|e| CloudError::remote(Stage::LookupRecord, &self.identity.email, e))?;
        docs.into_iter().map(decode_document::<ShareRecord>).collect()
    }

    pub async fn get_share(&self, id: &str) -> CloudResult<ShareRecord> {
        let doc = self
            .database
            .get(SHARED_FILES_COLLECTION, id)
            .await
            .map_err(|e| CloudError::remote(Stage::LookupRecord, id, e))?
            .ok_or_else(|| CloudError::NotFound(format!("{SHARED_FILES_COLLECTION}/{id}")))?;
        decode_document(doc)
    }

    /// Downloads a handed-off plaintext copy to `<work_dir>/<name>`.
    pub async fn fetch_shared(&self, share: &ShareRecord) -> CloudResult<PathBuf> {
        let mut progress = FileProgress::new(&*self.progress, &share.file_name);
        let result: CloudResult<PathBuf> = async {
            progress.stage(ProgressStage::Downloading, 10);
            let bytes = self
                .storage
                .fetch(&share.file_path)
                .await
                .map_err(|e| CloudError::remote(Stage::Download, &share.id, e))?;

            let target = self.work_dir.join(base_name(&share.file_path));
            let local = |e| CloudError::local(&share.id, e);
            tokio::fs::create_dir_all(&self.work_dir).await.map_err(local)?;
            tokio::fs::write(&target, &bytes).await.map_err(local)?;
            debug!(share_id = %share.id, path = %target.display(), "fetched shared copy");
            Ok(target)
        }
        .await;
        progress.finish(result)
    }

    /// Brings a pulled shared file back under encryption with a brand-new
    /// key pair held by the caller.
    ///
    /// The file is renamed to `<first two chars of user id>_<name>` in the
    /// work dir, published with slot = `share_id`, recorded in `files` at
    /// document id `share_id` (updated if present, created otherwise), and
    /// the remote plaintext copy is deleted.
    pub async fn re_encrypt_shared_file(
        &self,
        share_id: &str,
        plaintext_path: &Path,
    ) -> CloudResult<FileRecord> {
        let name = local_file_name(plaintext_path)?;
        if name.ends_with(ENCRYPTED_SUFFIX) {
            return Err(CloudError::AlreadyEncrypted(name));
        }

        let share = self.get_share(share_id).await?;
        self.lifecycle
            .check(share_id, FileState::HandedOffRemote, FileState::EncryptedRemote)?;

        let new_name = format!("{}_{name}", self.identity.short_prefix());
        let new_path = self.work_dir.join(&new_name);
        let local = |e| CloudError::local(share_id, e);
        tokio::fs::create_dir_all(&self.work_dir).await.map_err(local)?;
        tokio::fs::rename(plaintext_path, &new_path).await.map_err(local)?;

        let record = self
            .seal_and_upload(
                &new_path,
                &new_name,
                share_id,
                Some(share_id),
                FileState::HandedOffRemote,
            )
            .await?;

        self.storage
            .delete(&share.file_path)
            .await
            .map_err(|e| CloudError::remote(Stage::Delete, share_id, e))?;

        info!(share_id, path = %record.file_path, "re-encrypted shared file");
        Ok(record)
    }

    /// Pulls a shared copy and re-encrypts it under the caller's own key.
    pub async fn accept_share(&self, share: &ShareRecord) -> CloudResult<FileRecord> {
        let path = self.fetch_shared(share).await?;
        self.re_encrypt_shared_file(&share.id, &path).await
    }
}
