use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{export_landing_page_report, healthz, readyz};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(export_landing_page_report))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
