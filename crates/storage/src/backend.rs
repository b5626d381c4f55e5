//! Backend selection: one object store handle for every pipeline store.

use std::path::Path;
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use tracing::info;

use veridoc_core::config::AwsConfig;

use crate::error::StorageError;

/// The object store all pipeline stores write through, with the key prefix
/// shared by every object.
pub struct StorageBackend {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    remote: bool,
}

impl StorageBackend {
    /// Local filesystem backend rooted at `data_dir`, created when missing.
    pub fn local(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let root = std::fs::canonicalize(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&root)?;
        info!("Storage: local backend at {}", root.display());
        Ok(Self {
            store: Arc::new(store),
            prefix: String::new(),
            remote: false,
        })
    }

    /// S3 backend from the AWS config. Custom endpoints (MinIO, LocalStack)
    /// are honored when `endpoint_url` is set.
    pub fn s3(aws: &AwsConfig) -> Result<Self, StorageError> {
        let bucket = aws
            .s3_bucket
            .as_deref()
            .ok_or_else(|| StorageError::NotConfigured("S3_BUCKET not set".into()))?;

        let mut builder = AmazonS3Builder::new().with_region(&aws.region);
        if let Some(ref key) = aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(ref token) = aws.session_token {
            builder = builder.with_token(token);
        }

        builder = match aws.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => {
                // object_store requires absolute endpoint URLs
                let endpoint = if endpoint.contains("://") {
                    endpoint.to_string()
                } else {
                    format!("https://{endpoint}")
                };
                builder
                    .with_bucket_name(bucket)
                    .with_endpoint(&endpoint)
                    .with_allow_http(endpoint.starts_with("http://"))
            }
            None => builder.with_url(&format!("s3://{bucket}")),
        };

        let prefix = aws
            .s3_prefix
            .as_deref()
            .unwrap_or("")
            .trim_end_matches('/')
            .to_string();

        info!(
            "Storage: S3 backend s3://{}/{} (region: {})",
            bucket, prefix, aws.region
        );

        Ok(Self {
            store: Arc::new(builder.build()?),
            prefix,
            remote: true,
        })
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Key prefix for all objects (e.g. "production").
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_backend_creates_directory() {
        let tmp = std::env::temp_dir().join("veridoc-backend-test");
        let backend = StorageBackend::local(&tmp).unwrap();
        assert!(tmp.exists());
        assert!(!backend.is_remote());
        assert_eq!(backend.prefix(), "");
        std::fs::remove_dir_all(&tmp).ok();
    }
}
