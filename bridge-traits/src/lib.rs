//! Host bridge contract: every capability the playback core needs from
//! a platform, expressed as a trait the host implements.
//!
//! The core never talks to sockets, disks or audio engines directly.
//! It is handed implementations of:
//!
//! - [`RemoteResolver`](resolve::RemoteResolver), one per source kind,
//!   turning a logical reference into a fresh playable URL
//! - [`ByteFetcher`](http::ByteFetcher), pulling audio payloads behind
//!   resolved URLs
//! - [`BlobStore`](storage::BlobStore), the persistent byte store the
//!   durable cache tier sits on
//! - [`SettingsStore`](storage::SettingsStore), small key/value state
//! - [`PlayerHandle`](playback::PlayerHandle), the control surface of
//!   one platform audio engine, and
//!   [`MediaUrlFactory`](playback::MediaUrlFactory), which materializes
//!   playable URLs from byte buffers
//! - [`SimilarTrackSource`](recommend::SimilarTrackSource), follow-up
//!   lookup when the queue runs dry
//! - [`Clock`](time::Clock), [`TickSource`](time::TickSource) and
//!   [`LoggerSink`](time::LoggerSink) for time, stepped timers and log
//!   forwarding
//!
//! All traits are `Send + Sync` so they can be shared across async
//! tasks. Everything reports through [`BridgeError`](error::BridgeError);
//! implementations reserve `NotFound` for definitive not-found verdicts
//! and use `Network`/`Io` for transport failures, since the core treats
//! the two very differently (one is remembered, the other retried).
//!
//! The core fails fast at construction when a capability is missing,
//! naming the absent trait rather than panicking later:
//!
//! ```ignore
//! let fetcher = config.byte_fetcher.ok_or_else(|| {
//!     PlaybackError::CapabilityMissing {
//!         capability: "ByteFetcher".to_string(),
//!         message: "No byte fetcher provided. \
//!                   Desktop: enable the bridge-desktop default feature. \
//!                   Mobile: inject a platform-native adapter."
//!             .to_string(),
//!     }
//! })?;
//! ```

pub mod error;
pub mod http;
pub mod playback;
pub mod recommend;
pub mod resolve;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{ByteFetcher, RetryPolicy};
pub use playback::{MediaUrlFactory, MediaUrlHandle, PlayerHandle, PlayerState};
pub use recommend::SimilarTrackSource;
pub use resolve::{
    RemoteResolution, RemoteResolver, ResolveHints, SourceKind, TrackInfo, TrackRef,
};
pub use storage::{BlobListEntry, BlobMeta, BlobStore, SettingsStore, StoredBlob};
pub use time::{
    Clock, IntervalTickSource, LogEntry, LogLevel, LoggerSink, SystemClock, TickSource, Ticker,
};
