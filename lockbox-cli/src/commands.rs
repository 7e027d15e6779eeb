use crate::args::{Args, Command};
use anyhow::{bail, Context, Result};
use lockbox_cloud::{
    Coordinator, FnProgress, HttpDocumentDatabase, Identity, LockboxConfig, ProgressEvent,
    S3ObjectStorage,
};
use lockbox_keystore::{FileSecretStore, KeyManager};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Reads the TOML config at `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: &Path) -> Result<LockboxConfig> {
    let config = if path.exists() {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        LockboxConfig::default()
    };
    config.validate()?;
    Ok(config)
}

struct Session {
    config: LockboxConfig,
    store: Arc<FileSecretStore>,
    passphrase: String,
    user_id: Option<String>,
    email: Option<String>,
}

impl Session {
    /// Unlocks the key store and wires a coordinator to the remote
    /// collaborators.
    fn coordinator(&self) -> Result<Coordinator> {
        self.store.unlock(&self.passphrase)?;

        let user_id = self
            .user_id
            .clone()
            .context("--user-id (or LOCKBOX_USER_ID) is required")?;
        let email = self
            .email
            .clone()
            .context("--email (or LOCKBOX_EMAIL) is required")?;

        let storage = S3ObjectStorage::new(&self.config);
        let database = HttpDocumentDatabase::new(&self.config)?;
        let progress = FnProgress(|event: ProgressEvent| eprintln!("{event}"));

        Ok(Coordinator::new(
            Identity::new(user_id, email),
            KeyManager::new(self.store.clone()),
            Arc::new(storage),
            Arc::new(database),
            self.config.work_dir.clone(),
        )
        .with_progress(Arc::new(progress)))
    }
}

pub async fn run(args: Args) -> Result<()> {
    let config = load_config(&args.config)?;
    let passphrase = args
        .passphrase
        .context("key store passphrase is required (--passphrase or LOCKBOX_PASSPHRASE)")?;
    let session = Session {
        store: Arc::new(FileSecretStore::open(&config.keystore_dir)?),
        config,
        passphrase,
        user_id: args.user_id,
        email: args.email,
    };

    match args.command {
        Command::InitKeystore => {
            session.store.initialize(&session.passphrase)?;
            println!("initialized key store at {}", session.store.dir().display());
        }
        Command::Register => {
            let user = session.coordinator()?.register().await?;
            println!("registered {} ({})", user.email, user.id);
        }
        Command::Publish { files } => {
            let coordinator = session.coordinator()?;
            let results = coordinator.publish_many(&files).await;

            let mut failed = 0;
            for (path, result) in files.iter().zip(results) {
                match result {
                    Ok(record) => {
                        println!("{} -> {} [{}]", path.display(), record.file_path, record.id)
                    }
                    Err(e) => {
                        eprintln!("{}: {e}", path.display());
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} files failed to publish", files.len());
            }
        }
        Command::List => {
            for record in session.coordinator()?.list_files().await? {
                println!("{}\t{}\t{}", record.id, record.file_name, record.uploaded_at);
            }
        }
        Command::Open { doc_id } => {
            let coordinator = session.coordinator()?;
            let record = coordinator.get_file(&doc_id).await?;
            let path = coordinator.open(&record).await?;
            println!("{}", path.display());
        }
        Command::Share { doc_id, email } => {
            let coordinator = session.coordinator()?;
            let record = coordinator.get_file(&doc_id).await?;
            let share = coordinator.share(&record, &email).await?;
            println!("shared {} with {email} [{}]", record.file_name, share.id);
        }
        Command::Inbox => {
            for share in session.coordinator()?.shared_with_me().await? {
                println!("{}\t{}\tfrom {}", share.id, share.file_name, share.shared_by);
            }
        }
        Command::Accept { share_id } => {
            let coordinator = session.coordinator()?;
            let share = coordinator.get_share(&share_id).await?;
            let record = coordinator.accept_share(&share).await?;
            println!("{} -> {} [{}]", share.file_name, record.file_path, record.id);
        }
        Command::Delete { doc_id } => {
            let coordinator = session.coordinator()?;
            let record = coordinator.get_file(&doc_id).await?;
            coordinator.delete(&record).await?;
            println!("deleted {}", record.file_path);
        }
        Command::Url { doc_id } => {
            let coordinator = session.coordinator()?;
            let record = coordinator.get_file(&doc_id).await?;
            println!("{}", coordinator.download_url(&record).await?);
        }
    }
    Ok(())
}
