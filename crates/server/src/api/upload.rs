//! Upload boundary.
//!
//! Accepts a multipart file, stores the raw bytes in the content store
//! keyed by the derived job id, and triggers the analysis pipeline. The
//! job id is deterministic over (filename, bytes): re-uploading identical
//! bytes resolves to the already-analyzed job instead of burning a second
//! pipeline run.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use veridoc_core::document::job_id_for;

use crate::jobs::spawn_analysis_job;
use crate::state::AppState;

use super::ErrorResponse;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub filename: String,
}

type UploadError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> UploadError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    // Take the first part that carries a filename.
    let (filename, bytes) = loop {
        let field = multipart.next_field().await.map_err(|e| {
            bad_request(format!("invalid multipart request: {e}"))
        })?;
        let Some(field) = field else {
            return Err(bad_request("no file field in upload"));
        };
        if let Some(name) = field.file_name().map(String::from) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;
            break (name, bytes);
        }
    };

    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if !state.config.server.allowed_extensions.contains(&ext) {
        let allowed = state.config.server.allowed_extensions.join(", ");
        warn!(filename = %filename, "upload rejected: invalid format");
        return Err(bad_request(format!("only {allowed} files are allowed")));
    }

    if bytes.is_empty() {
        return Err(bad_request("uploaded file is empty"));
    }

    let job_id = job_id_for(&filename, &bytes);

    // Identical bytes map to an existing job: already ready, or mid-flight.
    // Either way the client polls the same id.
    let already_ready = matches!(state.store.fetch_report(&job_id).await, Ok(Some(_)));
    if already_ready || state.jobs.is_active(&job_id) {
        info!(job_id = %job_id, "duplicate upload, reusing existing job");
        return Ok(Json(UploadResponse { job_id, filename }));
    }

    state
        .store
        .put_document(&job_id, &filename, bytes)
        .await
        .map_err(|e| {
            warn!(job_id = %job_id, error = %e, "failed to store upload");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to store upload".to_string(),
                }),
            )
        })?;

    spawn_analysis_job(state.clone(), job_id.clone(), filename.clone());
    info!(job_id = %job_id, filename = %filename, "upload accepted, analysis started");

    Ok(Json(UploadResponse { job_id, filename }))
}
