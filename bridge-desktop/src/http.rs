//! Byte Fetcher Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ByteFetcher, RetryPolicy},
};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based byte fetcher
///
/// Provides payload downloads with:
/// - Connection pooling via reqwest
/// - Automatic retry with exponential backoff on transient failures
/// - TLS support by default
/// - Async streaming for large payloads
///
/// HTTP 404 and 410 map to [`BridgeError::NotFound`] so the core can treat
/// them as definitive absence rather than a transient failure.
pub struct ReqwestByteFetcher {
    client: Client,
}

impl ReqwestByteFetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new fetcher with custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("cadence-playback-core/0.1.0")
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Create a new fetcher over a pre-configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn map_status(status: StatusCode, url: &str) -> BridgeError {
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                BridgeError::NotFound(format!("resource gone: {}", url))
            }
            status => BridgeError::Network(format!("HTTP {} from {}", status.as_u16(), url)),
        }
    }

    fn map_transport(error: reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::Network("request timed out".to_string())
        } else if error.is_connect() {
            BridgeError::Network(format!("connection failed: {}", error))
        } else {
            BridgeError::Network(error.to_string())
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, url));
        }

        let body = response.bytes().await.map_err(Self::map_transport)?;
        debug!(url = %url, size = body.len(), "Fetched payload");
        Ok(body)
    }
}

impl Default for ReqwestByteFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteFetcher for ReqwestByteFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
        self.fetch_once(url).await
    }

    async fn fetch_bytes_with_retry(&self, url: &str, policy: RetryPolicy) -> Result<Bytes> {
        let mut last_error = None;

        for attempt in 1..=policy.max_attempts.max(1) {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                // Definitive absence never gets better with retries.
                Err(error @ BridgeError::NotFound(_)) => return Err(error),
                Err(error) => {
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = policy.max_attempts,
                        %error,
                        "Fetch attempt failed"
                    );
                    last_error = Some(error);
                }
            }

            if attempt < policy.max_attempts {
                let delay = policy.delay_for_attempt(attempt + 1);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| BridgeError::Network("all retry attempts exhausted".to_string())))
    }

    async fn fetch_stream(
        &self,
        url: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, url));
        }

        use futures_util::TryStreamExt;
        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(stream);

        Ok(Box::new(reader))
    }

    async fn is_connected(&self) -> bool {
        self.client
            .head("https://www.google.com")
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }
}
