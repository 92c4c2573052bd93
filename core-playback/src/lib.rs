//! # Playback Core
//!
//! Resolution, caching, predictive preloading and crossfaded playback for
//! track references, independent of any platform.
//!
//! ## Overview
//!
//! This crate owns the logic between "the UI asked for a track" and "a
//! platform engine has a URL to play":
//! - Multi-tier cache hierarchy consulted fastest-first before the network
//! - Per-source-kind remote resolution with timeout and de-duplication
//! - Background byte promotion into the persistent and instant tiers
//! - Queue-aware predictive preloading with weighted scoring
//! - Dual-engine crossfade with configurable volume ramps
//!
//! All platform concerns (HTTP, file storage, audio engines, timers) enter
//! through the `bridge-traits` abstractions, injected via
//! [`PlaybackEngineBuilder`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use core_playback::{EngineConfig, PlaybackEngine};
//!
//! let engine = PlaybackEngine::builder()
//!     .with_config(EngineConfig::default())
//!     .with_fetcher(fetcher)
//!     .with_url_factory(url_factory)
//!     .with_blob_store(blob_store)
//!     .with_players(active, standby)
//!     .add_remote_resolver(drive_resolver)
//!     .build()?;
//! engine.start().await;
//! ```

pub mod cache;
pub mod config;
pub mod crossfade;
pub mod engine;
pub mod error;
pub mod preload;
pub mod resolver;

pub use cache::{CacheConfig, CacheSnapshot, TierSet, TierStats};
pub use config::EngineConfig;
pub use crossfade::{CrossfadeConfig, CrossfadeController, CrossfadeOutcome, FadeCurve};
pub use engine::{PlaybackEngine, PlaybackEngineBuilder};
pub use error::{PlaybackError, Result};
pub use preload::{PredictionContext, PredictionScore, PredictivePreloader, PreloadConfig};
pub use resolver::{ResolvedStream, Resolver};
