//! The polling endpoint.
//!
//! A pure, non-blocking read of the job status store. An unknown job id and
//! a mid-flight job are indistinguishable to clients: both answer
//! `{ready: false}` and the client retries. Internal failures are logged
//! and also answer not-ready; the client only ever moves forward on
//! `ready && report present`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::warn;

use veridoc_core::report::Report;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Json<StatusResponse> {
    match state.store.fetch_report(&job_id).await {
        Ok(Some(report)) => Json(StatusResponse {
            ready: true,
            report: Some(report),
        }),
        Ok(None) => Json(StatusResponse {
            ready: false,
            report: None,
        }),
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "status read failed");
            Json(StatusResponse {
                ready: false,
                report: None,
            })
        }
    }
}
