//! Byte-fetch contract for pulling audio payloads behind resolved URLs.
//!
//! The core never issues general HTTP requests; once a URL is resolved
//! it only ever asks for "the bytes behind this URL", whole or as a
//! stream. TLS, pooling and retry live behind this trait.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// How retry delays grow between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed,
    /// Delay doubles per attempt, capped at the policy maximum.
    Exponential,
}

/// Retry schedule for transient fetch failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound no delay exceeds.
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential if attempt <= 1 => self.base_delay,
            Backoff::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1)),
        };
        delay.min(self.max_delay)
    }
}

/// Pulls bytes behind resolved URLs, backfilling the blob cache tiers.
///
/// Implementations own TLS validation, connection pooling and keep-alive.
/// HTTP 404/410 must map to
/// [`BridgeError::NotFound`](crate::error::BridgeError) so the core can
/// tell definitive absence from transient failure.
///
/// ```ignore
/// use bridge_traits::http::ByteFetcher;
///
/// async fn warm_cache(fetcher: &dyn ByteFetcher, url: &str) -> Result<usize> {
///     let bytes = fetcher.fetch_bytes(url).await?;
///     Ok(bytes.len())
/// }
/// ```
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Fetch the full payload behind a URL into memory.
    ///
    /// Fails on connection or TLS errors, or with `NotFound` when the
    /// server reports the resource gone.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes>;

    /// Fetch under a retry schedule.
    ///
    /// The default is a single attempt; real transports override this
    /// with actual retry logic.
    async fn fetch_bytes_with_retry(&self, url: &str, policy: RetryPolicy) -> Result<Bytes> {
        let _ = policy;
        self.fetch_bytes(url).await
    }

    /// Open a streaming read of the payload behind a URL, for payloads
    /// too large to hold in memory at once.
    async fn fetch_stream(
        &self,
        url: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

    /// Whether the host currently has network connectivity.
    async fn is_connected(&self) -> bool {
        true
    }
}
