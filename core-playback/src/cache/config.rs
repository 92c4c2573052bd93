//! Cache tier configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the tiered cache hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of fully materialized entries held in memory (default: 3)
    pub l0_capacity: usize,

    /// Maximum entries in the hot URL cache (default: 50)
    pub hot_capacity: usize,

    /// URL lifetime in the hot cache when the provider gives no expiry hint
    /// (default: 10 minutes)
    pub hot_default_ttl: Duration,

    /// URL lifetime in the speculative warm cache (default: 60s)
    pub warm_ttl: Duration,

    /// Maximum remembered not-found verdicts (default: 1000)
    pub negative_capacity: usize,

    /// Maximum durable cache size in bytes (default: 500MB)
    pub durable_max_bytes: u64,

    /// Maximum age of a durable entry before age-based cleanup removes it
    /// (default: 7 days)
    pub durable_max_age: Duration,

    /// Fraction of `durable_max_bytes` that size-based cleanup shrinks down
    /// to (default: 0.8)
    pub durable_cleanup_target: f64,

    /// Restrict the durable tier to the active and previous track only
    pub current_song_mode: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l0_capacity: 3,
            hot_capacity: 50,
            hot_default_ttl: Duration::from_secs(10 * 60),
            warm_ttl: Duration::from_secs(60),
            negative_capacity: 1000,
            durable_max_bytes: 500 * 1024 * 1024,
            durable_max_age: Duration::from_secs(7 * 24 * 60 * 60),
            durable_cleanup_target: 0.8,
            current_song_mode: false,
        }
    }
}

impl CacheConfig {
    /// Starting point for the builder methods below.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instant-tier capacity.
    pub fn with_l0_capacity(mut self, capacity: usize) -> Self {
        self.l0_capacity = capacity;
        self
    }

    /// Set the hot URL cache capacity.
    pub fn with_hot_capacity(mut self, capacity: usize) -> Self {
        self.hot_capacity = capacity;
        self
    }

    /// Set the fallback TTL for hot URLs without an expiry hint.
    pub fn with_hot_default_ttl(mut self, ttl: Duration) -> Self {
        self.hot_default_ttl = ttl;
        self
    }

    /// Set the warm URL TTL.
    pub fn with_warm_ttl(mut self, ttl: Duration) -> Self {
        self.warm_ttl = ttl;
        self
    }

    /// Set the negative cache capacity.
    pub fn with_negative_capacity(mut self, capacity: usize) -> Self {
        self.negative_capacity = capacity;
        self
    }

    /// Set the durable cache size cap.
    pub fn with_durable_max_bytes(mut self, bytes: u64) -> Self {
        self.durable_max_bytes = bytes;
        self
    }

    /// Set the durable cache age cap.
    pub fn with_durable_max_age(mut self, age: Duration) -> Self {
        self.durable_max_age = age;
        self
    }

    /// Enable or disable current-song-only durable retention.
    pub fn with_current_song_mode(mut self, enabled: bool) -> Self {
        self.current_song_mode = enabled;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.l0_capacity == 0 {
            return Err("l0_capacity must be at least 1".to_string());
        }

        if self.hot_capacity == 0 {
            return Err("hot_capacity must be at least 1".to_string());
        }

        if self.negative_capacity == 0 {
            return Err("negative_capacity must be at least 1".to_string());
        }

        if self.durable_max_bytes == 0 {
            return Err("durable_max_bytes must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.durable_cleanup_target) {
            return Err("durable_cleanup_target must be within [0.0, 1.0]".to_string());
        }

        if self.warm_ttl.is_zero() {
            return Err("warm_ttl must be greater than 0".to_string());
        }

        Ok(())
    }
}
