use std::sync::Arc;

use agency_common::gcp::MetadataTokenSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::clients::{ClientError, TaskQueue};
use crate::models::WorkItem;

/// Cloud Tasks client. Submission and pending counts only; retry policy lives
/// with the queue itself.
pub struct CloudTasksQueue {
    http: Client,
    auth: Arc<MetadataTokenSource>,
    queues_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTasksResponse {
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

impl CloudTasksQueue {
    pub fn new(http: Client, auth: Arc<MetadataTokenSource>, project: &str, location: &str) -> Self {
        Self {
            http,
            auth,
            queues_base: format!(
                "https://cloudtasks.googleapis.com/v2/projects/{project}/locations/{location}/queues"
            ),
        }
    }

    async fn token(&self) -> Result<String, ClientError> {
        self.auth
            .token()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))
    }

    fn tasks_url(&self, queue: &str) -> String {
        format!("{}/{queue}/tasks", self.queues_base)
    }
}

#[async_trait]
impl TaskQueue for CloudTasksQueue {
    async fn submit(&self, queue: &str, item: &WorkItem) -> Result<(), ClientError> {
        let token = self.token().await?;
        let body = json!({
            "task": {
                "httpRequest": { "httpMethod": "GET", "url": item.target_url }
            }
        });
        let response = self
            .http
            .post(self.tasks_url(queue))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::Api(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "task create on {queue} returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn pending_count(&self, queue: &str) -> Result<usize, ClientError> {
        let mut count = 0;
        let mut page_token: Option<String> = None;
        loop {
            let token = self.token().await?;
            let mut request = self
                .http
                .get(self.tasks_url(queue))
                .bearer_auth(token)
                .query(&[("pageSize", "1000")]);
            if let Some(page) = page_token.as_deref() {
                request = request.query(&[("pageToken", page)]);
            }
            let response = request
                .send()
                .await
                .map_err(|err| ClientError::Api(err.to_string()))?;
            if !response.status().is_success() {
                return Err(ClientError::Api(format!(
                    "task list on {queue} returned {}",
                    response.status()
                )));
            }
            let page: ListTasksResponse = response
                .json()
                .await
                .map_err(|err| ClientError::Decode(err.to_string()))?;
            count += page.tasks.len();
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(count)
    }
}
