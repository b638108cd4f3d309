use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::service;
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

/// Entry point hit by the external scheduler to kick off a full update run.
/// The request blocks until the run completes or fails.
pub async fn run_controller(State(state): State<AppState>) -> impl IntoResponse {
    match service::run_update(&state).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}
