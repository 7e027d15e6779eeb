//! Lockbox configuration.

use crate::error::{CloudError, CloudResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the coordinator and its remote collaborators.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LockboxConfig {
    /// Base URL of the document API (e.g., "https://api.lockbox.example").
    pub api_base_url: String,

    /// Bearer token for the document API.
    pub api_token: Option<String>,

    /// S3 bucket holding encrypted bodies and handed-off copies.
    pub s3_bucket: String,

    /// AWS region for S3.
    pub s3_region: String,

    /// Optional S3 endpoint override (for MinIO in testing).
    pub s3_endpoint_override: Option<String>,

    pub s3_access_key_id: String,
    pub s3_secret_access_key: String,

    /// Lifetime of presigned download URLs in seconds.
    pub download_url_ttl_secs: u64,

    /// Where opened and fetched files are written.
    pub work_dir: PathBuf,

    /// Directory of the passphrase-protected key store.
    pub keystore_dir: PathBuf,

    pub request_timeout_secs: u64,
}

impl Default for LockboxConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.lockbox.example".to_string(),
            api_token: None,
            s3_bucket: "lockbox-files".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint_override: None,
            s3_access_key_id: String::new(),
            s3_secret_access_key: String::new(),
            download_url_ttl_secs: 900,
            work_dir: PathBuf::from("lockbox-work"),
            keystore_dir: PathBuf::from("lockbox-keys"),
            request_timeout_secs: 30,
        }
    }
}

impl LockboxConfig {
    /// Creates a config for testing with MinIO and a local API.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            api_base_url: "http://localhost:3002".to_string(),
            api_token: Some("test-token".to_string()),
            s3_bucket: "lockbox-files".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint_override: Some("http://localhost:9000".to_string()),
            s3_access_key_id: "lockbox-test".to_string(),
            s3_secret_access_key: "lockbox-test-secret".to_string(),
            download_url_ttl_secs: 60,
            work_dir: std::env::temp_dir().join("lockbox-work"),
            keystore_dir: std::env::temp_dir().join("lockbox-keys"),
            request_timeout_secs: 5,
        }
    }

    /// Rejects settings that cannot work at all.
    pub fn validate(&self) -> CloudResult<()> {
        if self.s3_bucket.trim().is_empty() {
            return Err(CloudError::Config("s3_bucket must not be empty".to_string()));
        }
        if self.api_base_url.trim().is_empty() {
            return Err(CloudError::Config("api_base_url must not be empty".to_string()));
        }
        if self.download_url_ttl_secs == 0 {
            return Err(CloudError::Config(
                "download_url_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
