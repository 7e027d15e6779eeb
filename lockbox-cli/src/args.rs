use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lockbox", version)]
#[command(about = "Per-file envelope encryption and sharing over untrusted storage")]
pub struct Args {
    /// Path to the TOML config file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "lockbox.toml")]
    pub config: PathBuf,

    /// Key store passphrase.
    #[arg(long, global = true, env = "LOCKBOX_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// User id asserted by the authentication provider.
    #[arg(long, global = true, env = "LOCKBOX_USER_ID")]
    pub user_id: Option<String>,

    #[arg(long, global = true, env = "LOCKBOX_EMAIL")]
    pub email: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create the passphrase-protected key store.
    InitKeystore,
    /// Mint the account key pair and publish its public half.
    Register,
    /// Encrypt and upload local files.
    Publish {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List your published files.
    List,
    /// Download and decrypt a file into the work dir.
    Open { doc_id: String },
    /// Hand a decrypted copy of a file to another registered user.
    Share { doc_id: String, email: String },
    /// List files shared with you.
    Inbox,
    /// Pull a shared file and re-encrypt it under your own key.
    Accept { share_id: String },
    /// Remove a file's ciphertext and record.
    Delete { doc_id: String },
    /// Print a direct download URL for a file's ciphertext.
    Url { doc_id: String },
}
