use axum::http::StatusCode;
use chrono::Utc;

use crate::barrier::{self, DrainOutcome};
use crate::discovery;
use crate::enqueue;
use crate::models::{ErrorResponse, RunSummary};
use crate::state::AppState;

pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    fn internal(code: &'static str, message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse { code, message },
        }
    }
}

/// Runs one full update: discover the leaf accounts under the configured MCC,
/// fan out one report task per account, wait for the report queue to drain,
/// then fan out one audit task per collected base URL. Any fatal error fails
/// the whole run; the external scheduler re-triggers from the top.
pub async fn run_update(state: &AppState) -> Result<RunSummary, ServiceError> {
    let config = &state.config;
    let today = Utc::now().date_naive();

    let credentials = state.credentials.ads_credentials().await.map_err(|err| {
        tracing::error!(error = %err, "unable to load ads credentials");
        ServiceError::internal(
            "credentials_unavailable",
            "unable to load Ads credentials".to_string(),
        )
    })?;

    let mut run_state = state.run_state.load().await.map_err(|err| {
        tracing::error!(error = %err, "unable to load last run dates");
        ServiceError::internal(
            "run_state_unavailable",
            "unable to load last run dates".to_string(),
        )
    })?;

    let hierarchy = state.hierarchy.connect(&credentials).await.map_err(|err| {
        tracing::error!(error = %err, "unable to connect to the account hierarchy");
        ServiceError::internal(
            "hierarchy_unavailable",
            "unable to connect to the account hierarchy".to_string(),
        )
    })?;

    let root_id = credentials.mcc_id.replace('-', "");
    let accounts = discovery::discover_leaf_accounts(hierarchy.as_ref(), &root_id)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, root_id = %root_id, "account discovery failed");
            ServiceError::internal(
                "discovery_failed",
                "exception while getting client account ids".to_string(),
            )
        })?;
    tracing::info!(accounts = accounts.len(), root_id = %root_id, "account discovery complete");

    let reports = enqueue::enqueue_reports(
        &accounts,
        &mut run_state,
        today,
        state.queue.as_ref(),
        &config.report_queue,
        &config.report_handler_url,
        state.run_state.as_ref(),
    )
    .await;

    match barrier::wait_for_drain(
        state.queue.as_ref(),
        &config.report_queue,
        config.drain_poll,
        config.drain_max_attempts,
    )
    .await
    {
        Ok(DrainOutcome::Drained { polls }) => {
            tracing::info!(polls, queue = %config.report_queue, "report queue drained");
        }
        Ok(DrainOutcome::TimedOut { polls, pending }) => {
            tracing::error!(polls, pending, queue = %config.report_queue, "report queue never drained");
            return Err(ServiceError::internal(
                "drain_timeout",
                format!("report queue still has {pending} pending tasks"),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, queue = %config.report_queue, "queue poll failed");
            return Err(ServiceError::internal(
                "queue_unavailable",
                "unable to poll the report queue".to_string(),
            ));
        }
    }

    let base_urls = state.warehouse.base_urls().await.map_err(|err| {
        tracing::error!(error = %err, "exception querying for base URLs");
        ServiceError::internal(
            "warehouse_query_failed",
            "unable to query base URLs".to_string(),
        )
    })?;

    let audits = enqueue::enqueue_audits(
        &base_urls,
        state.queue.as_ref(),
        &config.audit_queue,
        &config.audit_handler_url,
    )
    .await
    .map_err(|err| {
        tracing::error!(error = %err, queue = %config.audit_queue, "exception queuing audit tasks");
        ServiceError::internal(
            "audit_enqueue_failed",
            "unable to queue audit tasks".to_string(),
        )
    })?;

    Ok(RunSummary {
        status: "ok",
        accounts_discovered: accounts.len(),
        reports_enqueued: reports.enqueued,
        reports_failed: reports.failed.len(),
        audits_enqueued: audits,
    })
}
