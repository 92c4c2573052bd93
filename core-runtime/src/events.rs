//! Typed events the playback core publishes while it works.
//!
//! The resolver, the cache tiers, the preloader and the crossfade state
//! machine each have their own event enum, all wrapped in [`CoreEvent`]
//! and fanned out over a `tokio::sync::broadcast` channel. Hosts
//! subscribe to drive UI state; tests subscribe to assert on observable
//! behavior instead of internals.
//!
//! Emitting is fire-and-forget:
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, ResolveEvent, CacheTier};
//!
//! # let event_bus = EventBus::new(100);
//! event_bus
//!     .emit(CoreEvent::Resolve(ResolveEvent::Resolved {
//!         reference: "catalog://track-1".to_string(),
//!         tier: CacheTier::Hot,
//!         elapsed_ms: 2,
//!     }))
//!     .ok();
//! ```
//!
//! Receivers see `RecvError::Lagged(n)` when they fall more than the bus
//! capacity behind and `RecvError::Closed` once every sender is gone.
//! A lagging subscriber skips events but never blocks a publisher.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Per-subscriber buffer depth used by [`EventBus::default`].
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
/// It wraps domain-specific event types for different modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Resolution-related events
    Resolve(ResolveEvent),
    /// Cache tier lifecycle events
    Cache(CacheEvent),
    /// Predictive preload events
    Preload(PreloadEvent),
    /// Crossfade state machine events
    Crossfade(CrossfadeEvent),
    /// Playback orchestration events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Resolve(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Preload(e) => e.description(),
            CoreEvent::Crossfade(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Resolve(ResolveEvent::Failed {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Resolve(ResolveEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Crossfade(CrossfadeEvent::Aborted { .. }) => EventSeverity::Warning,
            CoreEvent::Crossfade(CrossfadeEvent::TrackChanged { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::CleanupCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::TrackEnded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// One layer of the cache hierarchy, named in events and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheTier {
    /// Fastest tier: materialized byte buffers for current/recent tracks.
    L0,
    /// Speculative short-TTL URLs produced by the preloader.
    Warm,
    /// Frequency/recency-weighted URL cache.
    Hot,
    /// Persistent byte store, authoritative across restarts.
    Durable,
    /// Known-unfetchable references.
    Negative,
    /// Fresh network resolution (no tier hit).
    Network,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheTier::L0 => "l0",
            CacheTier::Warm => "warm",
            CacheTier::Hot => "hot",
            CacheTier::Durable => "durable",
            CacheTier::Negative => "negative",
            CacheTier::Network => "network",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Resolution Events
// ============================================================================

/// Events emitted by the resolver as references are turned into URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ResolveEvent {
    /// A reference resolved successfully.
    Resolved {
        /// The logical reference that was resolved.
        reference: String,
        /// Which tier satisfied the lookup.
        tier: CacheTier,
        /// Wall-clock time the resolution took.
        elapsed_ms: u64,
    },
    /// Resolution failed after falling through every tier.
    Failed {
        /// The logical reference.
        reference: String,
        /// Human-readable error message.
        message: String,
        /// Whether a retry could succeed (timeouts and transport failures
        /// are recoverable; known-unavailable references are not).
        recoverable: bool,
    },
    /// A reference was recorded as definitively unfetchable.
    MarkedUnavailable {
        /// The logical reference.
        reference: String,
    },
}

impl ResolveEvent {
    fn description(&self) -> &str {
        match self {
            ResolveEvent::Resolved { .. } => "Reference resolved",
            ResolveEvent::Failed { .. } => "Resolution failed",
            ResolveEvent::MarkedUnavailable { .. } => "Reference marked unavailable",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events related to cache tier population, promotion and eviction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// An entry was written into a tier.
    Populated {
        /// The tier written to.
        tier: CacheTier,
        /// The logical reference keyed.
        reference: String,
        /// Payload size in bytes, when the tier stores bytes.
        size_bytes: Option<u64>,
    },
    /// An entry was evicted from a tier by its eviction policy.
    Evicted {
        /// The tier evicted from.
        tier: CacheTier,
        /// The logical reference removed.
        reference: String,
    },
    /// A hit in a slower tier was copied into a faster one.
    Promoted {
        /// Tier the hit came from.
        from: CacheTier,
        /// Tier the entry was copied into.
        to: CacheTier,
        /// The logical reference.
        reference: String,
    },
    /// A durable-tier cleanup pass finished.
    CleanupCompleted {
        /// Entries removed because they exceeded the age bound.
        removed_by_age: u64,
        /// Entries removed to bring usage under the size bound.
        removed_by_size: u64,
        /// Total stored bytes after the pass.
        total_bytes: u64,
    },
    /// Every tier was invalidated by an explicit reset.
    Cleared,
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Populated { .. } => "Cache entry written",
            CacheEvent::Evicted { .. } => "Cache entry evicted",
            CacheEvent::Promoted { .. } => "Cache entry promoted",
            CacheEvent::CleanupCompleted { .. } => "Durable cleanup completed",
            CacheEvent::Cleared => "All cache tiers cleared",
        }
    }
}

// ============================================================================
// Preload Events
// ============================================================================

/// Events emitted by the predictive preloader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PreloadEvent {
    /// A prediction cycle started for a new active track.
    CycleStarted {
        /// Reference of the new active track.
        current: String,
        /// Number of candidates considered.
        candidate_count: usize,
    },
    /// A candidate scored above the relevance threshold and was queued.
    CandidateSelected {
        /// The candidate reference.
        reference: String,
        /// Its prediction score in `[0, 1]`.
        score: f64,
        /// Signals that contributed to the score.
        reasons: Vec<String>,
    },
    /// A speculative resolution finished.
    Completed {
        /// The candidate reference.
        reference: String,
    },
    /// A speculative resolution failed (advisory only, never surfaced).
    Failed {
        /// The candidate reference.
        reference: String,
        /// Human-readable error message.
        message: String,
    },
    /// A cycle was superseded by a newer active-track change before
    /// finishing; its remaining results are discarded.
    Superseded {
        /// Generation counter of the superseded cycle.
        generation: u64,
    },
}

impl PreloadEvent {
    fn description(&self) -> &str {
        match self {
            PreloadEvent::CycleStarted { .. } => "Prediction cycle started",
            PreloadEvent::CandidateSelected { .. } => "Preload candidate selected",
            PreloadEvent::Completed { .. } => "Preload completed",
            PreloadEvent::Failed { .. } => "Preload failed",
            PreloadEvent::Superseded { .. } => "Prediction cycle superseded",
        }
    }
}

// ============================================================================
// Crossfade Events
// ============================================================================

/// Events emitted by the crossfade state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum CrossfadeEvent {
    /// The standby engine is being primed with the upcoming track.
    Priming {
        /// Session identifier.
        session_id: String,
        /// Reference of the upcoming track.
        reference: String,
    },
    /// Both engines are running and the volume ramps have started.
    FadeStarted {
        /// Session identifier.
        session_id: String,
        /// Ramp duration in milliseconds.
        fade_ms: u64,
    },
    /// The fade completed and the engine handles were swapped.
    Swapped {
        /// Session identifier.
        session_id: String,
    },
    /// The active track changed. Emitted exactly once per completed swap.
    TrackChanged {
        /// Reference of the track now playing.
        reference: String,
    },
    /// The fade was abandoned; the previously active engine continues.
    Aborted {
        /// Session identifier.
        session_id: String,
        /// Why the fade was abandoned.
        reason: String,
    },
}

impl CrossfadeEvent {
    fn description(&self) -> &str {
        match self {
            CrossfadeEvent::Priming { .. } => "Priming standby engine",
            CrossfadeEvent::FadeStarted { .. } => "Crossfade ramps started",
            CrossfadeEvent::Swapped { .. } => "Engine handles swapped",
            CrossfadeEvent::TrackChanged { .. } => "Active track changed",
            CrossfadeEvent::Aborted { .. } => "Crossfade aborted",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to playback orchestration outside the fade path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track finished playing naturally.
    TrackEnded {
        /// Reference of the track that ended.
        reference: String,
    },
    /// The queue was empty at natural end and a similar track was chosen.
    AutoplaySelected {
        /// Reference of the chosen follow-up.
        reference: String,
    },
    /// The queue was empty and no follow-up could be found. Informational,
    /// not an error.
    AutoplayUnavailable,
    /// Playback was stopped by an explicit command.
    Stopped,
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackEnded { .. } => "Track ended",
            PlaybackEvent::AutoplaySelected { .. } => "Autoplay follow-up selected",
            PlaybackEvent::AutoplayUnavailable => "No autoplay follow-up found",
            PlaybackEvent::Stopped => "Playback stopped",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel carrying [`CoreEvent`]s from the core to anyone
/// listening.
///
/// Cloning the bus clones the sender side, so any number of modules can
/// publish. Each [`subscribe`](EventBus::subscribe) call hands out an
/// independent receiver; a subscriber that stops draining only hurts
/// itself (it lags, the others keep up).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// A subscriber more than `capacity` events behind receives
    /// `RecvError::Lagged` on its next `recv` and resumes from there.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    ///
    /// Returns how many subscribers received it, or an error when nobody
    /// is listening. Callers treat both outcomes as fire-and-forget.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Opens a fresh receiver seeing all events emitted from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of receivers currently open.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper that drops events a predicate rejects.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut fade_stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Crossfade(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Restricts the stream to events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn passes(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }

    /// Waits for the next event the filter accepts.
    ///
    /// Lag and closure surface exactly as they do on a raw receiver:
    /// `RecvError::Lagged(n)` after falling `n` events behind,
    /// `RecvError::Closed` once every sender is dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.passes(&event) {
                return Ok(event);
            }
        }
    }

    /// Drains without blocking; `None` means nothing is waiting.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.passes(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
