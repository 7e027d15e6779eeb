//! S3-backed object storage.
//!
//! Uses static credentials from the configuration. An endpoint override
//! switches to path-style addressing so MinIO works in testing.

use crate::config::LockboxConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::storage::{ObjectMetadata, ObjectRef, ObjectStorage};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;
use tracing::debug;

/// Object storage on an S3 bucket.
pub struct S3ObjectStorage {
    client: S3Client,
    bucket: String,
    url_ttl: Duration,
}

impl S3ObjectStorage {
    pub fn new(config: &LockboxConfig) -> Self {
        Self {
            client: Self::build_client(config),
            bucket: config.s3_bucket.clone(),
            url_ttl: Duration::from_secs(config.download_url_ttl_secs),
        }
    }

    fn build_client(config: &LockboxConfig) -> S3Client {
        let credentials = aws_credential_types::Credentials::new(
            &config.s3_access_key_id,
            &config.s3_secret_access_key,
            None,
            None,
            "lockbox-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(config.s3_region.clone()))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(ref endpoint) = config.s3_endpoint_override {
            config_builder = config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        S3Client::from_conf(config_builder.build())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> RemoteResult<ObjectRef> {
        let size = bytes.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(bytes));
        for (key, value) in metadata {
            request = request.metadata(key, value);
        }
        request
            .send()
            .await
            .map_err(|e| RemoteError::S3(format!("upload failed for {path}: {e}")))?;

        debug!("uploaded {size} bytes to s3://{}/{path}", self.bucket);
        Ok(ObjectRef {
            path: path.to_string(),
            size,
        })
    }

    async fn fetch(&self, path: &str) -> RemoteResult<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    RemoteError::NotFound(path.to_string())
                } else {
                    RemoteError::S3(format!("download failed for {path}: {service_err}"))
                }
            })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| RemoteError::S3(format!("failed to read body for {path}: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        debug!(
            "downloaded {} bytes from s3://{}/{path}",
            bytes.len(),
            self.bucket
        );
        Ok(bytes)
    }

    async fn download_url(&self, path: &str) -> RemoteResult<String> {
        let presign = PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| RemoteError::S3(format!("invalid presign ttl: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .presigned(presign)
            .await
            .map_err(|e| RemoteError::S3(format!("presign failed for {path}: {e}")))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| RemoteError::S3(format!("delete failed for {path}: {e}")))?;

        debug!("deleted s3://{}/{path}", self.bucket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn presigned_url_targets_bucket_and_key() {
        let storage = S3ObjectStorage::new(&LockboxConfig::test());
        let url = storage.download_url("hello.txt.enc").await.unwrap();
        assert!(url.starts_with("http://localhost:9000/lockbox-files/hello.txt.enc?"));
        assert!(url.contains("X-Amz-Expires=60"));
    }
}
