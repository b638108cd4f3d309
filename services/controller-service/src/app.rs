use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{healthz, readyz, run_controller};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(run_controller))
        .route("/controller", get(run_controller))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
