use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct ReportParams {
    pub cid: Option<String>,
    pub name: Option<String>,
    pub startdate: Option<String>,
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub status: &'static str,
    pub rows_loaded: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
