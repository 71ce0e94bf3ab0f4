// REST gateway over the notification backend
// One request per call, no retries; non-success statuses become typed errors

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::components::{
    BackendNotification, NotificationError, NotificationGateway, NotificationResult,
    RecipientType, SyncConfig,
};

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    notifications: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    notification: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    user_id: &'a str,
    title: &'a str,
    message: &'a str,
    recipient_type: RecipientType,
}

/// [`NotificationGateway`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    config: Arc<SyncConfig>,
}

impl HttpGateway {
    pub fn new(config: Arc<SyncConfig>) -> NotificationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| NotificationError::connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn sync_endpoint(&self, operation: &str, segments: &[&str]) -> NotificationResult<Url> {
        self.config
            .endpoint(segments)
            .map_err(|e| NotificationError::sync(operation, None, e.to_string()))
    }

    /// Send a mutating request and require a 2xx answer
    async fn send_mutation(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> NotificationResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::sync(operation, None, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(operation, status = status.as_u16(), "Backend rejected mutation");
            return Err(NotificationError::sync(
                operation,
                Some(status.as_u16()),
                format!("HTTP {}", status),
            ));
        }

        Ok(response)
    }
}

impl NotificationGateway for HttpGateway {
    fn fetch_all<'a>(
        &'a self,
        principal_id: &'a str,
    ) -> BoxFuture<'a, NotificationResult<Vec<BackendNotification>>> {
        Box::pin(async move {
            let url = self
                .config
                .endpoint(&["api", "notify", principal_id])
                .map_err(|e| NotificationError::fetch(self.config.backend_url.as_str(), None, e.to_string()))?;
            let endpoint = url.to_string();

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| NotificationError::fetch(&endpoint, None, format!("Failed to fetch notifications: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(NotificationError::fetch(
                    &endpoint,
                    Some(status.as_u16()),
                    format!("HTTP {} fetching notifications", status),
                ));
            }

            let body: FetchResponse = response.json().await.map_err(|e| {
                NotificationError::fetch(&endpoint, Some(status.as_u16()), format!("Malformed response body: {}", e))
            })?;

            let raw = body.notifications.unwrap_or_default();
            let total = raw.len();
            let records: Vec<BackendNotification> = raw
                .into_iter()
                .filter_map(|value| match BackendNotification::from_value(value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed notification record");
                        None
                    },
                })
                .collect();

            tracing::debug!(principal_id, total, accepted = records.len(), "Fetched notifications");
            Ok(records)
        })
    }

    fn mark_all_read<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(async move {
            const OPERATION: &str = "mark_all_read";
            let url = self.sync_endpoint(OPERATION, &["api", "notify", "mark-all-read", principal_id])?;
            self.send_mutation(OPERATION, self.client.put(url)).await?;
            Ok(())
        })
    }

    fn delete_one<'a>(&'a self, notification_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(async move {
            const OPERATION: &str = "delete_one";
            let url = self.sync_endpoint(OPERATION, &["api", "notify", notification_id])?;
            self.send_mutation(OPERATION, self.client.delete(url)).await?;
            Ok(())
        })
    }

    fn delete_all<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>> {
        Box::pin(async move {
            const OPERATION: &str = "delete_all";
            let url = self.sync_endpoint(OPERATION, &["api", "notify", "delete-all", principal_id])?;
            self.send_mutation(OPERATION, self.client.delete(url)).await?;
            Ok(())
        })
    }

    fn create<'a>(
        &'a self,
        principal_id: &'a str,
        title: &'a str,
        message: &'a str,
        recipient: RecipientType,
    ) -> BoxFuture<'a, NotificationResult<BackendNotification>> {
        Box::pin(async move {
            const OPERATION: &str = "create";
            let url = self.sync_endpoint(OPERATION, &["api", "notify"])?;
            let body = CreateRequest {
                user_id: principal_id,
                title,
                message,
                recipient_type: recipient,
            };

            let response = self
                .send_mutation(OPERATION, self.client.post(url).json(&body))
                .await?;
            let status = response.status().as_u16();
            let created: CreateResponse = response.json().await.map_err(|e| {
                NotificationError::sync(OPERATION, Some(status), format!("Malformed response body: {}", e))
            })?;

            BackendNotification::from_value(created.notification)
                .map_err(|e| NotificationError::sync(OPERATION, Some(status), e.to_string()))
        })
    }
}
