use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{ClientError, Warehouse};

/// BigQuery read client for the dashboard's collected base URLs.
pub struct BigQueryWarehouse {
    http: Client,
    auth: Arc<MetadataTokenSource>,
    project: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct Row {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Deserialize)]
struct Cell {
    v: serde_json::Value,
}

impl BigQueryWarehouse {
    pub fn new(http: Client, auth: Arc<MetadataTokenSource>, project: &str) -> Self {
        Self {
            http,
            auth,
            project: project.to_string(),
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn base_urls(&self) -> Result<Vec<String>, ClientError> {
        let token = self
            .auth
            .token()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        let query = format!(
            "SELECT BaseUrl FROM `{}.agency_dashboard.base_urls`",
            self.project
        );
        let response = self
            .http
            .post(format!(
                "https://bigquery.googleapis.com/bigquery/v2/projects/{}/queries",
                self.project
            ))
            .bearer_auth(token)
            .json(&json!({ "query": query, "useLegacySql": false }))
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "base_urls query returned {}",
                response.status()
            )));
        }
        let result: QueryResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;

        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| {
                row.f
                    .first()
                    .and_then(|cell| cell.v.as_str())
                    .map(str::to_string)
            })
            .collect())
    }
}
