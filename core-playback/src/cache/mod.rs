//! # Tiered Cache Module
//!
//! Provides the multi-tier cache hierarchy behind track resolution.
//!
//! ## Overview
//!
//! Resolution consults tiers from fastest to slowest and falls through to the
//! network only when every tier misses. Key features:
//! - Instant in-memory tier of fully materialized entries (bytes + URL)
//! - Scored hot URL cache that favors frequently replayed tracks
//! - Short-TTL warm cache fed by predictive preloading
//! - Negative cache that fails known-missing references fast
//! - Persistent durable tier with age and size cleanup
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Resolver lookup order               │
//! │                                         │
//! │  NegativeResultCache  (known missing)   │
//! │  L0BlobCache          (instant, 3)      │
//! │  DurableBlobStore     (persistent)      │
//! │  HotUrlCache          (scored URLs)     │
//! │  WarmUrlCache         (speculative)     │
//! │  ──> network                            │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{CacheConfig, L0BlobCache};
//! use bridge_traits::time::SystemClock;
//! use std::sync::Arc;
//!
//! let config = CacheConfig::default();
//! let l0 = L0BlobCache::new(config.l0_capacity, Arc::new(SystemClock));
//! ```

pub mod config;
pub mod durable;
pub mod hot;
pub mod l0;
pub mod negative;
pub mod stats;
pub mod warm;

// Re-export commonly used types
pub use config::CacheConfig;
pub use durable::DurableBlobStore;
pub use hot::{HotUrlCache, UrlHit};
pub use l0::{EvictedEntry, L0BlobCache, L0Hit};
pub use negative::NegativeResultCache;
pub use stats::{CacheSnapshot, CleanupReport, TierStats};
pub use warm::WarmUrlCache;

use bridge_traits::storage::BlobStore;
use bridge_traits::time::Clock;
use std::sync::Arc;

use crate::error::Result;

/// Every tier of the hierarchy, shareable across the resolver, preloader
/// and engine facade.
#[derive(Clone)]
pub struct TierSet {
    pub negative: Arc<NegativeResultCache>,
    pub l0: Arc<L0BlobCache>,
    pub hot: Arc<HotUrlCache>,
    pub warm: Arc<WarmUrlCache>,
    pub durable: Arc<DurableBlobStore>,
}

impl TierSet {
    /// Build every tier from a single configuration over the platform's
    /// persistent store.
    pub fn from_config(
        config: &CacheConfig,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            negative: Arc::new(NegativeResultCache::new(
                config.negative_capacity,
                clock.clone(),
            )),
            l0: Arc::new(L0BlobCache::new(config.l0_capacity, clock.clone())),
            hot: Arc::new(HotUrlCache::new(
                config.hot_capacity,
                config.hot_default_ttl,
                clock.clone(),
            )),
            warm: Arc::new(WarmUrlCache::new(config.warm_ttl, clock.clone())),
            durable: Arc::new(DurableBlobStore::new(
                store,
                clock.clone(),
                config.durable_max_bytes,
                config.durable_max_age,
                config.durable_cleanup_target,
            )),
        }
    }

    /// Point-in-time statistics across every tier.
    pub async fn snapshot(&self, clock: &dyn Clock) -> Result<CacheSnapshot> {
        Ok(CacheSnapshot {
            l0: self.l0.stats(),
            hot: self.hot.stats(),
            warm: self.warm.stats(),
            negative: self.negative.stats(),
            durable: self.durable.stats().await?,
            calculated_at: clock.now().timestamp(),
        })
    }
}
