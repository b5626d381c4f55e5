mod health;
mod jobs;
mod status;
mod upload;

pub use health::health;
pub use jobs::{jobs_get, jobs_list};
pub use status::status;
pub use upload::upload;

use serde::Serialize;

/// Error payload for client-facing failures (bad uploads, unknown jobs).
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
