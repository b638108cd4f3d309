use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{
    AdsCredentials, ChildPage, ChildRecord, ClientError, HierarchyConnector, HierarchyService,
};

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const ADS_API_BASE: &str = "https://googleads.googleapis.com/v17";

// Direct children only; deeper levels are reached by expanding each manager.
const CHILD_QUERY: &str = "SELECT customer_client.id, customer_client.descriptive_name, \
     customer_client.manager FROM customer_client WHERE customer_client.level = 1";

/// Builds a Google Ads search client per controller run, minting an access
/// token from the stored refresh token. Token-exchange semantics stay with
/// the vendor endpoint.
pub struct GoogleAdsConnector {
    http: Client,
}

impl GoogleAdsConnector {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct OauthToken {
    access_token: String,
}

#[async_trait]
impl HierarchyConnector for GoogleAdsConnector {
    async fn connect(
        &self,
        credentials: &AdsCredentials,
    ) -> Result<Arc<dyn HierarchyService>, ClientError> {
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

        Ok(Arc::new(GoogleAdsClient {
            http: self.http.clone(),
            access_token: token.access_token,
            developer_token: credentials.developer_token.clone(),
            login_customer_id: credentials.mcc_id.replace('-', ""),
        }))
    }
}

struct GoogleAdsClient {
    http: Client,
    access_token: String,
    developer_token: String,
    login_customer_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRow {
    customer_client: Option<CustomerClient>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CustomerClient {
    id: Option<String>,
    descriptive_name: Option<String>,
    manager: Option<bool>,
}

#[async_trait]
impl HierarchyService for GoogleAdsClient {
    async fn list_children(
        &self,
        manager_id: &str,
        page_token: Option<&str>,
    ) -> Result<ChildPage, ClientError> {
        let mut body = json!({ "query": CHILD_QUERY });
        if let Some(token) = page_token {
            body["pageToken"] = json!(token);
        }
        let response = self
            .http
            .post(format!(
                "{ADS_API_BASE}/customers/{manager_id}/googleAds:search"
            ))
            .bearer_auth(&self.access_token)
            .header("developer-token", &self.developer_token)
            .header("login-customer-id", &self.login_customer_id)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "customer_client search for {manager_id} returned {}",
                response.status()
            )));
        }
        let page: SearchResponse = response
            .json()
            .await
            .map_err(|err| ClientError::Decode(err.to_string()))?;

        Ok(ChildPage {
            children: page
                .results
                .into_iter()
                .map(|row| {
                    let client = row.customer_client.unwrap_or_default();
                    ChildRecord {
                        id: client.id,
                        display_name: client.descriptive_name,
                        is_manager: client.manager.unwrap_or(false),
                    }
                })
                .collect(),
            next_page_token: page.next_page_token,
        })
    }
}
