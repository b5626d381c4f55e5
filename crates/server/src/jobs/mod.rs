pub mod overlay;
pub mod runner;
pub mod types;

pub use runner::spawn_analysis_job;
pub use types::{JobRecord, JobRegistry, JobStatus, JobSummary};
