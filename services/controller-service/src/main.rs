mod app;
mod barrier;
mod clients;
mod config;
mod discovery;
mod enqueue;
mod gcp;
mod handlers;
mod models;
mod service;
mod state;

use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use agency_common::{bind_listener, env_or, init_tracing, shutdown_signal};

use crate::config::ControllerConfig;
use crate::gcp::ads::GoogleAdsConnector;
use crate::gcp::bigquery::BigQueryWarehouse;
use crate::gcp::firestore::FirestoreStore;
use crate::gcp::tasks::CloudTasksQueue;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let _guards = init_tracing("controller-service");

    let port = env_or("PORT", 8084u16);
    let project =
        std::env::var("GOOGLE_CLOUD_PROJECT").expect("GOOGLE_CLOUD_PROJECT is required");
    let location = std::env::var("APP_LOCATION").expect("APP_LOCATION is required");
    let config = Arc::new(ControllerConfig::from_env(project, location));

    let http = reqwest::Client::new();
    let auth = Arc::new(MetadataTokenSource::new(http.clone()));
    let firestore = Arc::new(FirestoreStore::new(
        http.clone(),
        auth.clone(),
        &config.project,
    ));

    let state = AppState {
        credentials: firestore.clone(),
        run_state: firestore,
        hierarchy: Arc::new(GoogleAdsConnector::new(http.clone())),
        queue: Arc::new(CloudTasksQueue::new(
            http.clone(),
            auth.clone(),
            &config.project,
            &config.location,
        )),
        warehouse: Arc::new(BigQueryWarehouse::new(http, auth, &config.project)),
        config,
    };

    let app = app::build_router(state);
    let listener = bind_listener(port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}
