//! In-memory job registry.
//!
//! Operational visibility only: the durable polling contract is the report
//! object in storage. The registry tracks per-job progress with atomic
//! counters so the jobs endpoints never block the pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use veridoc_core::document::JobId;

/// Current status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Report persisted; the job is READY for pollers.
    Completed,
    /// Infrastructure failure (e.g. report write exhausted retries).
    /// Pollers still see "processing", never a false ready.
    Failed,
}

/// One analysis job with atomic progress counters.
#[derive(Debug)]
pub struct JobRecord {
    pub id: JobId,
    pub filename: String,
    pub status: RwLock<JobStatus>,
    pub chunks_total: AtomicU64,
    pub chunks_done: AtomicU64,
    pub created_at: DateTime<Utc>,
    pub completed_at: RwLock<Option<DateTime<Utc>>>,
    pub error: RwLock<Option<String>>,
}

impl JobRecord {
    pub fn new(id: JobId, filename: String) -> Self {
        Self {
            id,
            filename,
            status: RwLock::new(JobStatus::Pending),
            chunks_total: AtomicU64::new(0),
            chunks_done: AtomicU64::new(0),
            created_at: Utc::now(),
            completed_at: RwLock::new(None),
            error: RwLock::new(None),
        }
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.write().unwrap() = status;
    }

    pub fn status(&self) -> JobStatus {
        *self.status.read().unwrap()
    }

    pub fn finish(&self, status: JobStatus, error: Option<String>) {
        self.set_status(status);
        *self.completed_at.write().unwrap() = Some(Utc::now());
        *self.error.write().unwrap() = error;
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            status: self.status(),
            chunks_total: self.chunks_total.load(Ordering::Relaxed),
            chunks_done: self.chunks_done.load(Ordering::Relaxed),
            created_at: self.created_at,
            completed_at: *self.completed_at.read().unwrap(),
            error: self.error.read().unwrap().clone(),
        }
    }
}

/// Serializable snapshot of one job for the jobs endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub filename: String,
    pub status: JobStatus,
    pub chunks_total: u64,
    pub chunks_done: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Insertion-ordered store of active and recent jobs, keyed by job id.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<IndexMap<JobId, Arc<JobRecord>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: Arc<JobRecord>) {
        self.jobs.write().unwrap().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobRecord>> {
        self.jobs.read().unwrap().get(id).cloned()
    }

    /// Whether a job is currently pending or running.
    pub fn is_active(&self, id: &str) -> bool {
        self.get(id)
            .map(|r| matches!(r.status(), JobStatus::Pending | JobStatus::Running))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> Vec<JobSummary> {
        self.jobs
            .read()
            .unwrap()
            .values()
            .map(|r| r.summary())
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
