use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};

use crate::models::{ErrorResponse, ReportParams, ReportResponse};
use crate::report;
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

fn error(status: StatusCode, code: &'static str, message: String) -> Response {
    (status, Json(ErrorResponse { code, message })).into_response()
}

/// Downloads, reshapes and loads the landing-page report for one client
/// account. Targeted by the controller's report-queue tasks.
pub async fn export_landing_page_report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Response {
    let Some(customer_id) = params.cid.filter(|cid| !cid.is_empty()) else {
        tracing::error!("client customer id (cid) not included in request");
        return error(
            StatusCode::BAD_REQUEST,
            "missing_cid",
            "customer client id not provided as cid query parameter".to_string(),
        );
    };
    let client_name = params.name.unwrap_or_default();

    let start = match params
        .startdate
        .as_deref()
        .map(str::parse::<NaiveDate>)
        .transpose()
    {
        Ok(start) => start,
        Err(_) => {
            tracing::info!(cid = %customer_id, "invalid date passed in startdate parameter");
            return error(
                StatusCode::BAD_REQUEST,
                "invalid_startdate",
                "invalid date in startdate parameter".to_string(),
            );
        }
    };

    let today = Utc::now().date_naive();
    let range = match report::date_range(start, today) {
        Ok(range) => range,
        Err(err) => {
            tracing::error!(cid = %customer_id, error = %err, "bad report window");
            return error(StatusCode::BAD_REQUEST, "startdate_in_future", err.to_string());
        }
    };

    let credentials = match state.credentials.ads_credentials().await {
        Ok(credentials) => credentials,
        Err(err) => {
            tracing::error!(error = %err, "unable to load ads credentials");
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "credentials_unavailable",
                "unable to load Ads credentials".to_string(),
            );
        }
    };

    let awql = report::report_query(&range);
    let report_csv = match state
        .reports
        .landing_page_report(&credentials, &customer_id, &awql)
        .await
    {
        Ok(csv) => csv,
        Err(err) => {
            tracing::error!(cid = %customer_id, error = %err, "problem retrieving landing page report");
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "report_unavailable",
                "unable to retrieve landing page report".to_string(),
            );
        }
    };

    let rows = match report::reshape(&report_csv, &customer_id, &client_name) {
        Ok(rows) => rows,
        Err(err) => {
            tracing::error!(cid = %customer_id, error = %err, "problem reading the landing page report");
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "report_unreadable",
                "unable to read landing page report".to_string(),
            );
        }
    };

    if !rows.is_empty() {
        if let Err(err) = state.sink.insert_rows(&rows).await {
            tracing::error!(cid = %customer_id, error = %err, "problem loading ads data into the warehouse");
            return error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "warehouse_load_failed",
                "unable to load report rows".to_string(),
            );
        }
    }

    tracing::info!(cid = %customer_id, rows = rows.len(), "landing page report loaded");
    (
        StatusCode::OK,
        Json(ReportResponse {
            status: "ok",
            rows_loaded: rows.len(),
        }),
    )
        .into_response()
}
