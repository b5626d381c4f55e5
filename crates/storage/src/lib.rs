//! Durable stores for the analysis pipeline, all keyed under one
//! object_store backend: raw uploads, document metadata, images (crops and
//! overlays), and the job status store.
//!
//! The job status store is deliberately minimal: a job is READY exactly when
//! its report object exists. Writing the report is therefore the single
//! observable step that flips readiness, and a failed write leaves the job
//! in PROCESSING.

pub mod backend;
pub mod error;

use bytes::Bytes;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use tracing::info;

use veridoc_core::config::Config;
use veridoc_core::document::DocumentMetadata;
use veridoc_core::report::Report;

pub use backend::StorageBackend;
pub use error::StorageError;

/// All pipeline storage behind one handle. Config selects local filesystem
/// or S3.
pub struct AnalysisStore {
    backend: StorageBackend,
    /// Base URL for retrievable image references. Falls back to the bare
    /// object key when unset.
    public_base_url: Option<String>,
}

impl AnalysisStore {
    pub fn new(backend: StorageBackend, public_base_url: Option<String>) -> Self {
        Self {
            backend,
            public_base_url,
        }
    }

    /// Create from config: S3 when AWS credentials are configured, local
    /// filesystem otherwise.
    pub fn from_config(config: &Config) -> Result<Self, StorageError> {
        let backend = if config.aws.is_configured() {
            StorageBackend::s3(&config.aws)?
        } else {
            StorageBackend::local(&config.storage.data_dir)?
        };
        Ok(Self::new(backend, config.storage.public_base_url.clone()))
    }

    fn path(&self, key: &str) -> StorePath {
        let prefix = self.backend.prefix();
        if prefix.is_empty() {
            StorePath::from(key)
        } else {
            StorePath::from(format!("{prefix}/{key}"))
        }
    }

    // ── Content store ───────────────────────────────────────────────

    pub fn document_key(job_id: &str, filename: &str) -> String {
        format!("documents/{job_id}/{filename}")
    }

    /// Store the raw upload bytes.
    pub async fn put_document(
        &self,
        job_id: &str,
        filename: &str,
        bytes: Bytes,
    ) -> Result<(), StorageError> {
        let key = Self::document_key(job_id, filename);
        self.backend
            .store()
            .put(&self.path(&key), PutPayload::from(bytes))
            .await?;
        info!(job_id = %job_id, key = %key, "stored uploaded document");
        Ok(())
    }

    /// Read the raw upload bytes back.
    pub async fn get_document(&self, job_id: &str, filename: &str) -> Result<Bytes, StorageError> {
        let key = Self::document_key(job_id, filename);
        let result = self.backend.store().get(&self.path(&key)).await?;
        Ok(result.bytes().await?)
    }

    // ── Metadata store ──────────────────────────────────────────────

    /// Persist decode metadata beside the report. Best-effort from the
    /// caller's perspective; failures here never fail the job.
    pub async fn put_metadata(
        &self,
        job_id: &str,
        metadata: &DocumentMetadata,
    ) -> Result<(), StorageError> {
        let key = format!("metadata/{job_id}.json");
        let body = serde_json::to_vec_pretty(metadata)?;
        self.backend
            .store()
            .put(&self.path(&key), PutPayload::from(body))
            .await?;
        Ok(())
    }

    // ── Job status store ────────────────────────────────────────────

    fn report_key(job_id: &str) -> String {
        format!("reports/{job_id}.json")
    }

    /// Persist the final report. This write IS the readiness flip: a poll
    /// that sees the object gets the full report, one that doesn't gets
    /// "processing".
    pub async fn put_report(&self, job_id: &str, report: &Report) -> Result<(), StorageError> {
        let key = Self::report_key(job_id);
        let body = serde_json::to_vec_pretty(report)?;
        self.backend
            .store()
            .put(&self.path(&key), PutPayload::from(body))
            .await?;
        info!(job_id = %job_id, "report persisted, job ready");
        Ok(())
    }

    /// Pure status read: `None` while the job is unknown or processing,
    /// the same report on every call once ready.
    pub async fn fetch_report(&self, job_id: &str) -> Result<Option<Report>, StorageError> {
        let key = Self::report_key(job_id);
        match self.backend.store().get(&self.path(&key)).await {
            Ok(result) => {
                let bytes = result.bytes().await?;
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ── Image store ─────────────────────────────────────────────────

    pub fn crop_key(job_id: &str, label: &str, media_type: &str) -> String {
        format!("images/{job_id}/{label}.{}", extension_for(media_type))
    }

    pub fn overlay_key(job_id: &str) -> String {
        format!("overlays/{job_id}.svg")
    }

    /// Store image bytes under `key` and return the retrievable reference.
    pub async fn put_image(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        self.backend
            .store()
            .put(&self.path(key), PutPayload::from(bytes))
            .await?;
        Ok(self.image_url(key))
    }

    /// The reference clients use to retrieve a stored image.
    pub fn image_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => key.to_string(),
        }
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veridoc_core::report::{AnalysisResponse, ReportStatus};
    use veridoc_core::verdict::{ChunkVerdict, RiskLevel};

    fn temp_store() -> (AnalysisStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("veridoc-store-{}", uuid::Uuid::new_v4()));
        let backend = StorageBackend::local(&dir).unwrap();
        (AnalysisStore::new(backend, None), dir)
    }

    fn sample_report(job_id: &str) -> Report {
        Report {
            form_id: job_id.to_string(),
            status: ReportStatus::Success,
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4(),
            tampered_chunks: vec![0],
            response: AnalysisResponse {
                explanation: vec![ChunkVerdict {
                    chunk: 0,
                    risk: RiskLevel::High,
                    confidence: 8.0,
                    reasoning: "test".to_string(),
                }],
            },
            overlay_image_url: None,
            issues: vec![],
        }
    }

    #[tokio::test]
    async fn report_absent_until_written() {
        let (store, dir) = temp_store();
        assert!(store.fetch_report("job-1").await.unwrap().is_none());

        store.put_report("job-1", &sample_report("job-1")).await.unwrap();
        let fetched = store.fetch_report("job-1").await.unwrap().unwrap();
        assert_eq!(fetched.form_id, "job-1");
        assert_eq!(fetched.tampered_chunks, vec![0]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn repeated_polls_return_the_same_report() {
        let (store, dir) = temp_store();
        store.put_report("job-2", &sample_report("job-2")).await.unwrap();

        let first = store.fetch_report("job-2").await.unwrap().unwrap();
        let second = store.fetch_report("job-2").await.unwrap().unwrap();
        assert_eq!(first.request_id, second.request_id);
        assert_eq!(first.timestamp, second.timestamp);
        assert_eq!(first.tampered_chunks, second.tampered_chunks);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn document_roundtrip() {
        let (store, dir) = temp_store();
        let bytes = Bytes::from_static(b"raw document bytes");
        store.put_document("job-3", "form.pdf", bytes.clone()).await.unwrap();
        let back = store.get_document("job-3", "form.pdf").await.unwrap();
        assert_eq!(back, bytes);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn image_url_uses_public_base() {
        let dir = std::env::temp_dir().join(format!("veridoc-store-{}", uuid::Uuid::new_v4()));
        let backend = StorageBackend::local(&dir).unwrap();
        let store = AnalysisStore::new(backend, Some("https://cdn.example.com/".to_string()));

        let url = store
            .put_image("overlays/job-4.svg", b"<svg/>".to_vec())
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/overlays/job-4.svg");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn metadata_is_persisted() {
        let (store, dir) = temp_store();
        let metadata = DocumentMetadata {
            filename: "form.pdf".to_string(),
            file_type: "pdf".to_string(),
            byte_size: 1234,
            page_count: 2,
        };
        store.put_metadata("job-5", &metadata).await.unwrap();
        assert!(dir.join("metadata/job-5.json").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn key_layout() {
        assert_eq!(
            AnalysisStore::document_key("job-1", "a.pdf"),
            "documents/job-1/a.pdf"
        );
        assert_eq!(AnalysisStore::overlay_key("job-1"), "overlays/job-1.svg");
        assert_eq!(
            AnalysisStore::crop_key("job-1", "signature", "image/png"),
            "images/job-1/signature.png"
        );
    }
}
