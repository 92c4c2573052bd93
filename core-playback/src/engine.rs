//! # Playback Engine Facade
//!
//! Wires the cache tiers, resolver, preloader and crossfade controller into
//! one host-facing surface.
//!
//! ## Overview
//!
//! The host injects its platform bridges through the builder, then drives
//! the engine with a handful of calls:
//! - `resolve` for the active track
//! - `on_active_track_changed` on every queue advance
//! - `begin_crossfade_if_due` from its position poll
//! - `on_track_ended` at natural end-of-track
//!
//! Everything observable happens on the event bus; the facade never calls
//! back into the host.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              PlaybackEngine                  │
//! │                                              │
//! │  Resolver ──── TierSet ──── DurableBlobStore │
//! │     │                                        │
//! │  PredictivePreloader    CrossfadeController  │
//! │     │                        │               │
//! │     └──────── EventBus ──────┘               │
//! └──────────────────────────────────────────────┘
//!        ▲ bridges injected via builder
//! ```

use bridge_traits::http::ByteFetcher;
use bridge_traits::playback::{MediaUrlFactory, PlayerHandle};
use bridge_traits::recommend::SimilarTrackSource;
use bridge_traits::resolve::{RemoteResolver, ResolveHints, TrackInfo, TrackRef};
use bridge_traits::storage::{BlobStore, SettingsStore};
use bridge_traits::time::{Clock, IntervalTickSource, SystemClock, TickSource};
use core_runtime::events::{CacheEvent, CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheSnapshot, TierSet};
use crate::config::EngineConfig;
use crate::crossfade::{CrossfadeController, CrossfadeOutcome};
use crate::error::{PlaybackError, Result};
use crate::preload::PredictivePreloader;
use crate::resolver::{ResolvedStream, Resolver};

const DEFAULT_EVENT_CAPACITY: usize = 256;

fn capability_missing(capability: &str, message: &str) -> PlaybackError {
    PlaybackError::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder assembling a [`PlaybackEngine`] from injected platform bridges.
///
/// Required: a byte fetcher, a media URL factory, a blob store, an
/// active/standby player pair and at least one remote resolver. Optional:
/// settings store (context persistence degrades gracefully without it) and
/// a similar-track source (autoplay reports unavailable without it).
pub struct PlaybackEngineBuilder {
    config: EngineConfig,
    remotes: Vec<Arc<dyn RemoteResolver>>,
    fetcher: Option<Arc<dyn ByteFetcher>>,
    url_factory: Option<Arc<dyn MediaUrlFactory>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    settings: Option<Arc<dyn SettingsStore>>,
    similar: Option<Arc<dyn SimilarTrackSource>>,
    players: Option<(Arc<dyn PlayerHandle>, Arc<dyn PlayerHandle>)>,
    clock: Arc<dyn Clock>,
    ticks: Arc<dyn TickSource>,
    event_capacity: usize,
}

impl Default for PlaybackEngineBuilder {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            remotes: Vec::new(),
            fetcher: None,
            url_factory: None,
            blob_store: None,
            settings: None,
            similar: None,
            players: None,
            clock: Arc::new(SystemClock),
            ticks: Arc::new(IntervalTickSource),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PlaybackEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a resolver for one source kind. Later registrations of the
    /// same kind win.
    pub fn add_remote_resolver(mut self, remote: Arc<dyn RemoteResolver>) -> Self {
        self.remotes.push(remote);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ByteFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_url_factory(mut self, url_factory: Arc<dyn MediaUrlFactory>) -> Self {
        self.url_factory = Some(url_factory);
        self
    }

    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    pub fn with_settings_store(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_similar_track_source(mut self, similar: Arc<dyn SimilarTrackSource>) -> Self {
        self.similar = Some(similar);
        self
    }

    /// Inject the active/standby playback engine pair.
    pub fn with_players(
        mut self,
        active: Arc<dyn PlayerHandle>,
        standby: Arc<dyn PlayerHandle>,
    ) -> Self {
        self.players = Some((active, standby));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_source(mut self, ticks: Arc<dyn TickSource>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Assemble the engine, failing fast on invalid configuration or a
    /// missing required capability.
    pub fn build(self) -> Result<PlaybackEngine> {
        self.config.validate()?;

        let fetcher = self.fetcher.ok_or_else(|| {
            capability_missing(
                "ByteFetcher",
                "A ByteFetcher implementation is required for network resolution and \
                 byte promotion. Desktop: use bridge_desktop::ReqwestByteFetcher. \
                 Mobile: inject a platform HTTP client wrapper.",
            )
        })?;
        let url_factory = self.url_factory.ok_or_else(|| {
            capability_missing(
                "MediaUrlFactory",
                "A MediaUrlFactory implementation is required to turn cached bytes \
                 into playable URLs. Desktop: use bridge_desktop::TempFileUrlFactory. \
                 Web: inject a blob-URL factory.",
            )
        })?;
        let blob_store = self.blob_store.ok_or_else(|| {
            capability_missing(
                "BlobStore",
                "A BlobStore implementation is required for the durable cache tier. \
                 Desktop: use bridge_desktop::FsBlobStore. Mobile: inject app-container \
                 file storage.",
            )
        })?;
        let (active, standby) = self.players.ok_or_else(|| {
            capability_missing(
                "PlayerHandle",
                "Two PlayerHandle implementations (active and standby) are required \
                 for crossfaded playback. Inject them via with_players.",
            )
        })?;
        if self.remotes.is_empty() {
            return Err(capability_missing(
                "RemoteResolver",
                "At least one RemoteResolver must be registered so references can \
                 be resolved by source kind.",
            ));
        }

        let events = EventBus::new(self.event_capacity);
        let tiers = TierSet::from_config(&self.config.cache, blob_store, self.clock.clone());

        let resolver = Resolver::new(
            tiers,
            self.remotes,
            fetcher,
            url_factory.clone(),
            events.clone(),
            self.clock.clone(),
            self.config.resolve_timeout,
            self.config.promotion_timeout,
        );

        let preloader = Arc::new(PredictivePreloader::new(
            resolver.clone(),
            self.settings,
            events.clone(),
            self.clock.clone(),
            self.config.preload.clone(),
        ));

        let crossfade = Arc::new(CrossfadeController::new(
            resolver.clone(),
            active,
            standby,
            self.ticks,
            events.clone(),
            self.config.crossfade.clone(),
        ));

        Ok(PlaybackEngine {
            resolver,
            preloader,
            crossfade,
            events,
            clock: self.clock,
            url_factory,
            similar: self.similar,
            current: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
        })
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Host-facing playback core.
pub struct PlaybackEngine {
    resolver: Resolver,
    preloader: Arc<PredictivePreloader>,
    crossfade: Arc<CrossfadeController>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    url_factory: Arc<dyn MediaUrlFactory>,
    similar: Option<Arc<dyn SimilarTrackSource>>,
    current: Mutex<Option<TrackInfo>>,
    queue: Mutex<VecDeque<TrackInfo>>,
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine").finish_non_exhaustive()
    }
}

impl PlaybackEngine {
    pub fn builder() -> PlaybackEngineBuilder {
        PlaybackEngineBuilder::new()
    }

    /// Restore persisted state. Call once after construction; failures are
    /// logged and the engine starts fresh.
    pub async fn start(&self) {
        self.preloader.load_context().await;
        info!("Playback engine started");
    }

    /// Subscribe to the engine's event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Engine currently carrying audible playback.
    pub fn active_player(&self) -> Arc<dyn PlayerHandle> {
        self.crossfade.active_handle()
    }

    /// Track the host last reported as active, if any.
    pub fn current_track(&self) -> Option<TrackInfo> {
        self.current.lock().clone()
    }

    /// Resolve a reference to a playable URL through the tier hierarchy.
    pub async fn resolve(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
    ) -> Result<ResolvedStream> {
        self.resolver.resolve(reference, hints).await
    }

    /// Record the new active track and its upcoming queue, and kick off a
    /// predictive preload cycle over the queue snapshot.
    #[instrument(skip(self, current, queue), fields(current = %current.reference))]
    pub async fn on_active_track_changed(&self, current: TrackInfo, queue: Vec<TrackInfo>) {
        {
            *self.current.lock() = Some(current.clone());
            *self.queue.lock() = queue.iter().cloned().collect();
        }
        self.preloader.on_active_track_changed(&current, &queue).await;
    }

    /// Begin a crossfade into the next queued track when the active one is
    /// inside the overlap window.
    ///
    /// With nothing queued there is nothing to fade into and the call
    /// reports [`CrossfadeOutcome::NotDue`].
    pub async fn begin_crossfade_if_due(&self, remaining: Duration) -> Result<CrossfadeOutcome> {
        let next = match self.queue.lock().front().cloned() {
            Some(next) => next,
            None => return Ok(CrossfadeOutcome::NotDue),
        };

        let outcome = self.crossfade.begin_crossfade_if_due(&next, remaining).await?;

        if outcome == CrossfadeOutcome::Completed {
            let mut queue = self.queue.lock();
            // The faded-into track may have been superseded by a queue update
            // while the ramp ran; only advance when the head still matches.
            if queue.front().map(|head| head.reference == next.reference) == Some(true) {
                queue.pop_front();
            }
            drop(queue);
            *self.current.lock() = Some(next);
        }

        Ok(outcome)
    }

    /// Handle natural end-of-track.
    ///
    /// Returns the track the host should play next: the queue head when one
    /// exists, otherwise a similar-track suggestion. Autoplay runs only on
    /// this path, never on manual skips.
    pub async fn on_track_ended(&self) -> Result<Option<TrackInfo>> {
        let ended = self.current.lock().clone();

        if let Some(track) = &ended {
            self.events
                .emit(CoreEvent::Playback(PlaybackEvent::TrackEnded {
                    reference: track.reference.to_string(),
                }))
                .ok();
        }

        if let Some(next) = self.queue.lock().pop_front() {
            return Ok(Some(next));
        }

        let seed = match (&self.similar, ended) {
            (Some(similar), Some(ended)) => Some((similar.clone(), ended)),
            _ => None,
        };

        if let Some((similar, ended)) = seed {
            match similar.similar_to(&ended).await {
                Ok(Some(follow_up)) => {
                    info!(reference = %follow_up.reference, "Autoplay follow-up selected");
                    self.events
                        .emit(CoreEvent::Playback(PlaybackEvent::AutoplaySelected {
                            reference: follow_up.reference.to_string(),
                        }))
                        .ok();
                    return Ok(Some(follow_up));
                }
                Ok(None) => {}
                Err(error) => {
                    debug!(%error, "Similar-track lookup failed");
                }
            }
        }

        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::AutoplayUnavailable))
            .ok();
        Ok(None)
    }

    /// Point-in-time statistics for every cache tier.
    pub async fn cache_stats(&self) -> Result<CacheSnapshot> {
        self.resolver.tiers().snapshot(self.clock.as_ref()).await
    }

    /// Invalidate every cache tier, releasing materialized URL resources.
    pub async fn clear_all(&self) -> Result<()> {
        let tiers = self.resolver.tiers();
        tiers.negative.clear();
        tiers.hot.clear();
        tiers.warm.clear();

        for handle in tiers.l0.clear() {
            if let Err(error) = self.url_factory.release(handle).await {
                warn!(%error, "Failed to release media URL during clear");
            }
        }

        let removed = tiers.durable.clear().await?;
        info!(removed_durable = removed, "All cache tiers cleared");

        self.events
            .emit(CoreEvent::Cache(CacheEvent::Cleared))
            .ok();
        Ok(())
    }

    /// Stop background work: cancels any in-progress fade and invalidates
    /// pending preload dispatches.
    pub fn shutdown(&self) {
        self.crossfade.cancel();
        self.preloader.cancel_pending();
        self.events
            .emit(CoreEvent::Playback(PlaybackEvent::Stopped))
            .ok();
        info!("Playback engine shut down");
    }
}
