//! HTTP router construction.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(api::health))
        .route(
            "/upload",
            post(api::upload).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/status/{job_id}", get(api::status))
        .route("/jobs", get(api::jobs_list))
        .route("/jobs/{id}", get(api::jobs_get))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
