use std::collections::BTreeMap;
use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::clients::{AdsCredentials, ClientError, CredentialStore, ReportSource, WarehouseSink};

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REPORT_DOWNLOAD_URL: &str =
    "https://adwords.google.com/api/adwords/reportdownload/v201809";

/// Reads the shared `agency_ads/credentials` document.
pub struct FirestoreCredentials {
    http: Client,
    auth: Arc<MetadataTokenSource>,
    document_url: String,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
}

impl FirestoreCredentials {
    pub fn new(http: Client, auth: Arc<MetadataTokenSource>, project: &str) -> Self {
        Self {
            http,
            auth,
            document_url: format!(
                "https://firestore.googleapis.com/v1/projects/{project}/databases/(default)/documents/agency_ads/credentials"
            ),
        }
    }
}

fn string_field(document: &Document, name: &str) -> Result<String, ClientError> {
    document
        .fields
        .get(name)
        .and_then(|value| value.string_value.clone())
        .ok_or_else(|| ClientError::Decode(format!("credentials document missing {name}")))
}

#[async_trait]
impl CredentialStore for FirestoreCredentials {
    async fn ads_credentials(&self) -> Result<AdsCredentials, ClientError> {
        let token = self
            .auth
            .token()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        let response = self
            .http
            .get(&self.document_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound("agency_ads/credentials".to_string()));
        }
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "credentials read returned {}",
                response.status()
            )));
        }
        let document: Document = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;

        Ok(AdsCredentials {
            developer_token: string_field(&document, "developer_token")?,
            client_id: string_field(&document, "client_id")?,
            client_secret: string_field(&document, "client_secret")?,
            refresh_token: string_field(&document, "refresh_token")?,
        })
    }
}

#[derive(Deserialize)]
struct OauthToken {
    access_token: String,
}

/// Downloads AWQL reports through the AdWords report-download endpoint.
pub struct AdwordsReportDownloader {
    http: Client,
}

impl AdwordsReportDownloader {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    async fn access_token(&self, credentials: &AdsCredentials) -> Result<String, ClientError> {
        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "ads token exchange returned {}",
                response.status()
            )));
        }
        let token: OauthToken = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ReportSource for AdwordsReportDownloader {
    async fn landing_page_report(
        &self,
        credentials: &AdsCredentials,
        customer_id: &str,
        awql: &str,
    ) -> Result<String, ClientError> {
        let token = self.access_token(credentials).await?;
        let response = self
            .http
            .post(REPORT_DOWNLOAD_URL)
            .bearer_auth(token)
            .header("developerToken", &credentials.developer_token)
            .header("clientCustomerId", customer_id)
            .header("skipReportHeader", "true")
            .header("skipReportSummary", "true")
            .form(&[("__rdquery", awql), ("__fmt", "CSV")])
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "report download for {customer_id} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// Streams reshaped report rows into the warehouse `ads_data` table.
pub struct BigQuerySink {
    http: Client,
    auth: Arc<MetadataTokenSource>,
    insert_url: String,
}

impl BigQuerySink {
    pub fn new(http: Client, auth: Arc<MetadataTokenSource>, project: &str) -> Self {
        Self {
            http,
            auth,
            insert_url: format!(
                "https://bigquery.googleapis.com/bigquery/v2/projects/{project}/datasets/agency_dashboard/tables/ads_data/insertAll"
            ),
        }
    }
}

#[derive(Deserialize)]
struct InsertResponse {
    #[serde(default, rename = "insertErrors")]
    insert_errors: Vec<Value>,
}

#[async_trait]
impl WarehouseSink for BigQuerySink {
    async fn insert_rows(&self, rows: &[Map<String, Value>]) -> Result<(), ClientError> {
        let token = self
            .auth
            .token()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        let body = json!({
            "rows": rows.iter().map(|row| json!({ "json": row })).collect::<Vec<_>>()
        });
        let response = self
            .http
            .post(&self.insert_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "ads_data insert returned {}",
                response.status()
            )));
        }
        let result: InsertResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        if !result.insert_errors.is_empty() {
            return Err(ClientError::Api(format!(
                "ads_data insert rejected {} rows",
                result.insert_errors.len()
            )));
        }
        Ok(())
    }
}
