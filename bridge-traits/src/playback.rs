//! Playback Engine & Media URL Abstractions
//!
//! These traits let the core drive platform audio engines and turn in-memory
//! audio buffers into playable URLs without knowing how either is done. The
//! crossfade controller owns two [`PlayerHandle`]s (active and standby) and
//! only ever speaks this narrow surface to them.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// Playback lifecycle state reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing loaded.
    Idle,
    /// A source is loading or buffering.
    Loading,
    /// Buffered enough to start without stalling.
    Ready,
    Playing,
    Paused,
    Stopped,
    /// Reached the natural end of the loaded source.
    Ended,
}

/// Trait for a single platform playback engine instance.
///
/// Two independent handles exist at any time; the core swaps which one is
/// "active" at crossfade completion. Implementations must tolerate control
/// calls in any state and report failures rather than panic.
#[async_trait]
pub trait PlayerHandle: Send + Sync {
    /// Load a source URL, replacing whatever was loaded before.
    ///
    /// Returns once the engine has accepted the source; readiness to play is
    /// reported through [`state`](Self::state) reaching [`PlayerState::Ready`].
    async fn load(&self, url: &str) -> Result<()>;

    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the loaded source.
    async fn pause(&self) -> Result<()>;

    /// Stop playback and release the loaded source.
    async fn stop(&self) -> Result<()>;

    /// Reset to [`PlayerState::Idle`], dropping position and source.
    async fn reset(&self) -> Result<()>;

    /// Adjust volume, normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Current volume, normalized to `0.0..=1.0`.
    async fn volume(&self) -> Result<f32>;

    /// Current playback position.
    async fn position(&self) -> Result<Duration>;

    /// Total duration of the loaded source, when known.
    async fn duration(&self) -> Result<Option<Duration>>;

    /// Current lifecycle state.
    async fn state(&self) -> Result<PlayerState>;
}

/// Handle to a playable URL materialized from an in-memory buffer.
///
/// The fastest cache tier owns these exclusively; forgetting one without
/// calling [`MediaUrlFactory::release`] leaks the backing resource for the
/// lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaUrlHandle {
    id: Uuid,
    url: String,
}

impl MediaUrlHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Trait for turning byte buffers into engine-playable URLs.
///
/// Implementations may write a temp file, register an in-process media
/// server route, or wrap a platform blob URL. `release` must free whatever
/// `materialize` allocated.
#[async_trait]
pub trait MediaUrlFactory: Send + Sync {
    /// Produce a playable URL backed by the given buffer.
    async fn materialize(&self, data: Bytes) -> Result<MediaUrlHandle>;

    /// Free the resource behind a previously materialized URL.
    async fn release(&self, handle: MediaUrlHandle) -> Result<()>;
}
