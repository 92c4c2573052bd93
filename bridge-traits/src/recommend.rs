//! Similar-Track Recommendation Abstraction
//!
//! Consulted only when the queue is empty at natural end-of-track; never on
//! manual skip. Best-effort: returning `Ok(None)` is an ordinary outcome.

use async_trait::async_trait;

use crate::error::Result;
use crate::resolve::TrackInfo;

/// Trait for fetching a follow-up track similar to the one that just ended.
#[async_trait]
pub trait SimilarTrackSource: Send + Sync {
    /// Find a track similar to `track`, or `None` when nothing suitable
    /// exists.
    async fn similar_to(&self, track: &TrackInfo) -> Result<Option<TrackInfo>>;
}
