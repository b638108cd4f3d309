mod app;
mod clients;
mod gcp;
mod handlers;
mod models;
mod report;
mod state;

use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use agency_common::{bind_listener, env_or, init_tracing, shutdown_signal};

use crate::gcp::{AdwordsReportDownloader, BigQuerySink, FirestoreCredentials};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("ads-task-handler");

    let port = env_or("PORT", 8090u16);
    let project =
        std::env::var("GOOGLE_CLOUD_PROJECT").expect("GOOGLE_CLOUD_PROJECT is required");

    let http = reqwest::Client::new();
    let auth = Arc::new(MetadataTokenSource::new(http.clone()));
    let state = AppState {
        credentials: Arc::new(FirestoreCredentials::new(http.clone(), auth.clone(), &project)),
        reports: Arc::new(AdwordsReportDownloader::new(http.clone())),
        sink: Arc::new(BigQuerySink::new(http, auth, &project)),
    };

    let app = app::build_router(state);
    let listener = bind_listener(port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}
