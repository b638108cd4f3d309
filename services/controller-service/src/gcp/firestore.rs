use std::collections::BTreeMap;
use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::clients::{AdsCredentials, ClientError, CredentialStore, RunStateStore};
use crate::models::RunState;

const COLLECTION: &str = "agency_ads";
const CREDENTIALS_DOC: &str = "credentials";
const CONFIG_DOC: &str = "config";

/// Firestore-backed document store holding the Ads credentials and the
/// per-account last-run dates.
pub struct FirestoreStore {
    http: Client,
    auth: Arc<MetadataTokenSource>,
    documents_base: String,
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
    map_value: Option<MapValue>,
}

#[derive(Deserialize, Default)]
struct MapValue {
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

impl FirestoreStore {
    pub fn new(http: Client, auth: Arc<MetadataTokenSource>, project: &str) -> Self {
        Self {
            http,
            auth,
            documents_base: format!(
                "https://firestore.googleapis.com/v1/projects/{project}/databases/(default)/documents"
            ),
        }
    }

    async fn token(&self) -> Result<String, ClientError> {
        self.auth
            .token()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))
    }

    fn document_url(&self, doc: &str) -> String {
        format!("{}/{COLLECTION}/{doc}", self.documents_base)
    }

    async fn fetch_document(&self, doc: &str) -> Result<Option<Document>, ClientError> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.document_url(doc))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "document read for {COLLECTION}/{doc} returned {}",
                response.status()
            )));
        }
        let document = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;
        Ok(Some(document))
    }

    async fn create_config_document(&self) -> Result<(), ClientError> {
        let token = self.token().await?;
        let body = json!({ "fields": { "last_run": { "mapValue": { "fields": {} } } } });
        let response = self
            .http
            .post(format!(
                "{}/{COLLECTION}?documentId={CONFIG_DOC}",
                self.documents_base
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "config document create returned {}",
                response.status()
            )));
        }
        Ok(())
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
impl CredentialStore for FirestoreStore {
    async fn ads_credentials(&self) -> Result<AdsCredentials, ClientError> {
        let document = self
            .fetch_document(CREDENTIALS_DOC)
            .await?
            .ok_or_else(|| ClientError::NotFound(format!("{COLLECTION}/{CREDENTIALS_DOC}")))?;

        Ok(AdsCredentials {
            mcc_id: string_field(&document, "mcc_id")?,
            developer_token: string_field(&document, "developer_token")?,
            client_id: string_field(&document, "client_id")?,
            client_secret: string_field(&document, "client_secret")?,
            refresh_token: string_field(&document, "refresh_token")?,
        })
    }
}

#[async_trait]
impl RunStateStore for FirestoreStore {
    async fn load(&self) -> Result<RunState, ClientError> {
        let Some(document) = self.fetch_document(CONFIG_DOC).await? else {
            self.create_config_document().await?;
            return Ok(RunState::new());
        };

        let mut run_state = RunState::new();
        let entries = document
            .fields
            .get("last_run")
            .and_then(|value| value.map_value.as_ref())
            .map(|map| &map.fields);
        let Some(entries) = entries else {
            tracing::info!("last run dates not present yet");
            return Ok(run_state);
        };

        for (account_id, value) in entries {
            let Some(raw) = value.string_value.as_deref() else {
                tracing::warn!(cid = %account_id, "last run entry is not a string, skipping");
                continue;
            };
            match raw.parse::<NaiveDate>() {
                Ok(date) => {
                    run_state.insert(account_id.clone(), date);
                }
                Err(_) => {
                    tracing::warn!(cid = %account_id, value = raw, "unparsable last run date, skipping");
                }
            }
        }
        Ok(run_state)
    }

    async fn record_run(&self, account_id: &str, date: NaiveDate) -> Result<(), ClientError> {
        let token = self.token().await?;
        // Account ids are numeric, so the field path needs backquotes.
        let field_path = format!("last_run.`{account_id}`");
        let body = json!({
            "fields": {
                "last_run": {
                    "mapValue": {
                        "fields": { account_id: { "stringValue": date.to_string() } }
                    }
                }
            }
        });
        let response = self
            .http
            .patch(self.document_url(CONFIG_DOC))
            .query(&[("updateMask.fieldPaths", field_path.as_str())])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "last run update for {account_id} returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
