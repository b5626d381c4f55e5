//! Operational job views backed by the in-memory registry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::jobs::JobSummary;
use crate::state::AppState;

use super::ErrorResponse;

pub async fn jobs_list(State(state): State<Arc<AppState>>) -> Json<Vec<JobSummary>> {
    Json(state.jobs.snapshot())
}

pub async fn jobs_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, (StatusCode, Json<ErrorResponse>)> {
    match state.jobs.get(&id) {
        Some(record) => Ok(Json(record.summary())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no job with id '{id}'"),
            }),
        )),
    }
}
