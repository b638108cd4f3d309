use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{RunState, WorkItem};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Api(String),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Ads API credentials stored in the `agency_ads/credentials` document.
#[derive(Debug, Clone)]
pub struct AdsCredentials {
    pub mcc_id: String,
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// One child entry as returned by the hierarchy service. Fields the vendor
/// omitted stay `None`; the walker skips malformed records instead of failing
/// the whole page.
#[derive(Debug, Clone)]
pub struct ChildRecord {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub is_manager: bool,
}

/// One page of direct children of a manager account.
#[derive(Debug, Default)]
pub struct ChildPage {
    pub children: Vec<ChildRecord>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait HierarchyService: Send + Sync {
    async fn list_children(
        &self,
        manager_id: &str,
        page_token: Option<&str>,
    ) -> Result<ChildPage, ClientError>;
}

/// Builds a hierarchy client for one controller run from freshly loaded
/// credentials. Nothing is cached across runs.
#[async_trait]
pub trait HierarchyConnector: Send + Sync {
    async fn connect(
        &self,
        credentials: &AdsCredentials,
    ) -> Result<Arc<dyn HierarchyService>, ClientError>;
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn submit(&self, queue: &str, item: &WorkItem) -> Result<(), ClientError>;
    async fn pending_count(&self, queue: &str) -> Result<usize, ClientError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn ads_credentials(&self) -> Result<AdsCredentials, ClientError>;
}

#[async_trait]
pub trait RunStateStore: Send + Sync {
    /// Loads the persisted last-run map, creating an empty one when the
    /// backing document does not exist yet.
    async fn load(&self) -> Result<RunState, ClientError>;
    async fn record_run(&self, account_id: &str, date: NaiveDate) -> Result<(), ClientError>;
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Base URLs collected by the report handlers, one per row.
    async fn base_urls(&self) -> Result<Vec<String>, ClientError>;
}
