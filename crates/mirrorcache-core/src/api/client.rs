//! HTTP client for the remote manifest and mirrored resources.
//!
//! This module provides the `MirrorClient` struct, a thin wrapper over
//! `reqwest::Client` that fetches the version manifest and resource bodies,
//! retrying rate-limited requests with exponential backoff.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::MirrorError;
use crate::models::RemoteEntry;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Client for the manifest endpoint and resource origins.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct MirrorClient {
    client: Client,
    initial_backoff_ms: u64,
}

impl MirrorClient {
    /// Create a new client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
        })
    }

    /// Override the first rate-limit backoff delay.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Fetch and parse the remote version manifest.
    ///
    /// Transport and status failures map to `MirrorError::Network`; a body
    /// that is not a JSON array of `{url, hash, alias?}` maps to
    /// `MirrorError::Parse`.
    pub async fn fetch_manifest(&self, url: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let body = self.get_bytes(url).await?;
        let entries: Vec<RemoteEntry> = serde_json::from_slice(&body)
            .map_err(|e| MirrorError::Parse(format!("manifest from {}: {}", url, e)))?;
        debug!(url = url, entries = entries.len(), "Remote manifest fetched");
        Ok(entries)
    }

    /// Fetch a resource body.
    pub async fn fetch_resource(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let body = self.get_bytes(url).await?;
        debug!(url = url, bytes = body.len(), "Resource fetched");
        Ok(body)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = self.initial_backoff_ms;

        loop {
            let response = self.client.get(url).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return Ok(response.bytes().await?.to_vec());
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client() -> MirrorClient {
        MirrorClient::new(Duration::from_secs(5))
            .expect("build client")
            .with_initial_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_fetch_manifest_parses_entries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200)
                    .body(r#"[{"url":"https://a.com/x.js","hash":"h1","alias":["https://b.com/x.js"]}]"#);
            })
            .await;

        let entries = client()
            .fetch_manifest(&server.url("/manifest.json"))
            .await
            .expect("fetch manifest");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hash, "h1");
    }

    #[tokio::test]
    async fn test_fetch_manifest_malformed_is_parse_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200).body("{not json");
            })
            .await;

        let err = client()
            .fetch_manifest(&server.url("/manifest.json"))
            .await
            .expect_err("malformed manifest");
        assert!(matches!(err, MirrorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fetch_resource_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.js");
                then.status(404).body("nope");
            })
            .await;

        let err = client()
            .fetch_resource(&server.url("/missing.js"))
            .await
            .expect_err("404");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_retries() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/busy.js");
                then.status(429);
            })
            .await;

        let err = client()
            .fetch_resource(&server.url("/busy.js"))
            .await
            .expect_err("rate limited");
        assert!(matches!(err, ApiError::RateLimited));
        mock.assert_hits_async(MAX_RATE_LIMIT_RETRIES as usize + 1).await;
    }
}
