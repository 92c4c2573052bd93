//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! the playback core requires, using desktop-appropriate libraries:
//! - `ByteFetcher` using `reqwest` with retry and streaming support
//! - `BlobStore` using hashed files plus JSON sidecar metadata on `tokio::fs`
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `MediaUrlFactory` using uniquely named temp files served as `file://` URLs
//!
//! Audio engine handles (`PlayerHandle`) are not provided here; they come
//! from whichever playback backend the host application embeds.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsBlobStore, ReqwestByteFetcher, TempFileUrlFactory};
//! use core_playback::PlaybackEngine;
//! use std::sync::Arc;
//!
//! let engine = PlaybackEngine::builder()
//!     .with_fetcher(Arc::new(ReqwestByteFetcher::new()))
//!     .with_blob_store(Arc::new(FsBlobStore::new()))
//!     .with_url_factory(Arc::new(TempFileUrlFactory::new()))
//!     // players, resolvers, config ...
//!     .build()?;
//! ```

mod blob_store;
mod http;
mod media;
mod settings;

pub use blob_store::FsBlobStore;
pub use http::ReqwestByteFetcher;
pub use media::TempFileUrlFactory;
pub use settings::SqliteSettingsStore;
