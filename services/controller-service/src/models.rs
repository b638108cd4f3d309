use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// A node in the Ads account hierarchy. Manager accounts have children and
/// are never a unit of work; leaves are the client accounts reports run for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub is_manager: bool,
}

/// Last run date per client account, keyed by account id.
pub type RunState = BTreeMap<String, NaiveDate>;

/// A deferred HTTP GET. Once submitted the queue owns it entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub target_url: String,
}

#[derive(Serialize)]
pub struct RunSummary {
    pub status: &'static str,
    pub accounts_discovered: usize,
    pub reports_enqueued: usize,
    pub reports_failed: usize,
    pub audits_enqueued: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
