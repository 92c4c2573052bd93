//! Engine configuration
//!
//! Bundles the per-component configurations with the resolver timeouts into
//! one serializable document the host hands to the engine builder.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::crossfade::CrossfadeConfig;
use crate::error::{PlaybackError, Result};
use crate::preload::PreloadConfig;

/// Top-level configuration for the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cache tier sizing and retention.
    pub cache: CacheConfig,
    /// Predictive preload scoring and dispatch.
    pub preload: PreloadConfig,
    /// Crossfade overlap, stepping and curve.
    pub crossfade: CrossfadeConfig,
    /// Hard deadline for a foreground network resolution.
    pub resolve_timeout: Duration,
    /// Deadline for background byte promotion; longer than the resolve
    /// timeout because no caller is waiting on it.
    pub promotion_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            preload: PreloadConfig::default(),
            crossfade: CrossfadeConfig::default(),
            resolve_timeout: Duration::from_secs(8),
            promotion_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_preload(mut self, preload: PreloadConfig) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_crossfade(mut self, crossfade: CrossfadeConfig) -> Self {
        self.crossfade = crossfade;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_promotion_timeout(mut self, timeout: Duration) -> Self {
        self.promotion_timeout = timeout;
        self
    }

    /// Validate the whole configuration tree.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(PlaybackError::Config)?;
        self.preload.validate().map_err(PlaybackError::Config)?;
        self.crossfade.validate().map_err(PlaybackError::Config)?;

        if self.resolve_timeout.is_zero() {
            return Err(PlaybackError::Config(
                "resolve_timeout must be greater than zero".to_string(),
            ));
        }
        if self.promotion_timeout < self.resolve_timeout {
            return Err(PlaybackError::Config(
                "promotion_timeout must not be shorter than resolve_timeout".to_string(),
            ));
        }

        Ok(())
    }
}
