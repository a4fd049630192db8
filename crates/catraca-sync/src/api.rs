//! Client for the academic API's turnstile endpoint.
//!
//! Both directions use `<base>/api/catraca` with a `Token` header:
//!
//! - `GET` returns the user records (see [`UserRecord`](crate::UserRecord))
//! - `POST` takes waiting passages and returns one acknowledgement each

#![allow(async_fn_in_trait)]

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{SyncError, SyncResult};

const ENDPOINT: &str = "api/catraca";
const TOKEN_HEADER: &str = "Token";

/// A passage as pushed to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPayload {
    pub event_id: String,
    pub user_id: String,
    /// Local wall-clock milliseconds, see `SyncJob::with_utc_offset_hours`
    pub timestamp_millis: i64,
}

/// Outcome the API reports for one pushed passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessAck {
    pub event_id: String,
    pub status: AckStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// The two calls the synchronization job makes.
pub trait CatracaApi: Send + Sync {
    /// Fetch the raw user records; each element is validated separately.
    async fn fetch_users(&self) -> SyncResult<Vec<serde_json::Value>>;

    /// Push waiting passages and collect the acknowledgements.
    async fn push_accesses(&self, accesses: &[AccessPayload]) -> SyncResult<Vec<AccessAck>>;
}

/// [`CatracaApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpApiClient {
    /// Client with a 30 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Http` if the TLS backend cannot be initialised.
    pub fn new(base_url: &str, token: impl Into<String>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Reuse an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            url: format!("{}/{ENDPOINT}", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fail on non-2xx, otherwise parse the body as JSON.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> SyncResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SyncError::Api {
                status: status.as_u16(),
                body,
            });
        }
        trace!(bytes = body.len(), "API response received");
        serde_json::from_str(&body).map_err(|e| SyncError::Parse(e.to_string()))
    }
}

impl CatracaApi for HttpApiClient {
    async fn fetch_users(&self) -> SyncResult<Vec<serde_json::Value>> {
        debug!(url = %self.url, "Fetching users");
        let response = self
            .client
            .get(&self.url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn push_accesses(&self, accesses: &[AccessPayload]) -> SyncResult<Vec<AccessAck>> {
        debug!(url = %self.url, count = accesses.len(), "Pushing accesses");
        let response = self
            .client
            .post(&self.url)
            .header(TOKEN_HEADER, &self.token)
            .json(accesses)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joins_base() {
        let client = HttpApiClient::with_client(reqwest::Client::new(), "http://api.local/", "t");
        assert_eq!(client.url(), "http://api.local/api/catraca");
    }

    #[test]
    fn test_payload_is_camel_case() {
        let payload = AccessPayload {
            event_id: "e1".to_string(),
            user_id: "2024001".to_string(),
            timestamp_millis: 1_000,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"eventId": "e1", "userId": "2024001", "timestampMillis": 1000})
        );
    }

    #[test]
    fn test_ack_parsing() {
        let acks: Vec<AccessAck> = serde_json::from_value(json!([
            {"eventId": "e1", "status": "success", "message": "ok"},
            {"eventId": "e2", "status": "failed"}
        ]))
        .unwrap();

        assert_eq!(acks[0].status, AckStatus::Success);
        assert_eq!(acks[1].status, AckStatus::Failed);
        assert_eq!(acks[1].message, None);
    }
}
