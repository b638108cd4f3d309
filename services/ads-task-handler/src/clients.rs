use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

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
/// The report is always downloaded for the CID in the request, so the MCC id
/// is not needed here.
#[derive(Debug, Clone)]
pub struct AdsCredentials {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn ads_credentials(&self) -> Result<AdsCredentials, ClientError>;
}

/// Fetches the raw landing-page report CSV for one client account.
#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn landing_page_report(
        &self,
        credentials: &AdsCredentials,
        customer_id: &str,
        awql: &str,
    ) -> Result<String, ClientError>;
}

/// Receives reshaped report rows for the warehouse `ads_data` table.
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    async fn insert_rows(&self, rows: &[Map<String, Value>]) -> Result<(), ClientError>;
}
