//! # Crossfade Module
//!
//! Drives the timed transition between two platform playback engines.
//!
//! ## Overview
//!
//! The controller owns an active/standby pair of [`PlayerHandle`]s. When the
//! active track nears its end, it primes the standby engine with the next
//! track, ramps the two volumes against each other on a fixed-step ticker,
//! then swaps the handles. Key properties:
//! - At most one fade alive at a time (mutex-held check-and-set guard)
//! - Exactly one `TrackChanged` event per completed swap
//! - Any failure aborts without touching the active engine's playback
//! - Explicit cancellation tears the ticker down deterministically
//!
//! ## State machine
//!
//! ```text
//!            begin_crossfade_if_due
//!                      │
//!   Idle ──────────> Priming ──────> Fading ──────> Swapped ──> Idle
//!                      │                │
//!                      └── Aborted <───┘   (guard cleared, no swap)
//! ```

pub mod curve;

pub use curve::FadeCurve;

use bridge_traits::playback::{PlayerHandle, PlayerState};
use bridge_traits::resolve::TrackInfo;
use bridge_traits::time::TickSource;
use core_runtime::events::{CoreEvent, CrossfadeEvent, EventBus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PlaybackError, Result};
use crate::resolver::Resolver;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the crossfade state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossfadeConfig {
    /// How long before the end of the active track the fade may begin.
    pub overlap: Duration,
    /// Interval between volume ramp steps.
    pub step_interval: Duration,
    /// Shape of the volume ramps.
    pub curve: FadeCurve,
    /// Volume the incoming engine ramps toward, normalized to `0.0..=1.0`.
    pub target_volume: f32,
    /// How long priming may wait for the standby engine to become ready.
    pub priming_ready_timeout: Duration,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            overlap: Duration::from_secs(5),
            step_interval: Duration::from_millis(20),
            curve: FadeCurve::default(),
            target_volume: 1.0,
            priming_ready_timeout: Duration::from_secs(10),
        }
    }
}

impl CrossfadeConfig {
    pub fn with_overlap(mut self, overlap: Duration) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_step_interval(mut self, step_interval: Duration) -> Self {
        self.step_interval = step_interval;
        self
    }

    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_target_volume(mut self, target_volume: f32) -> Self {
        self.target_volume = target_volume;
        self
    }

    pub fn with_priming_ready_timeout(mut self, timeout: Duration) -> Self {
        self.priming_ready_timeout = timeout;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.step_interval.is_zero() {
            return Err("step_interval must be greater than zero".to_string());
        }
        if self.priming_ready_timeout.is_zero() {
            return Err("priming_ready_timeout must be greater than zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.target_volume) {
            return Err("target_volume must be within 0.0..=1.0".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Phase of the crossfade state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadePhase {
    /// No fade in progress.
    Idle,
    /// The standby engine is resolving and loading the next track.
    Priming,
    /// Both engines are running and the volume ramps are stepping.
    Fading,
    /// The ramps finished and the handles are being swapped.
    Swapped,
    /// The fade failed or was cancelled; cleanup is running.
    Aborted,
}

/// Result of a [`CrossfadeController::begin_crossfade_if_due`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeOutcome {
    /// The fade ran to completion and the handles were swapped.
    Completed,
    /// The active track has more time left than the configured overlap.
    NotDue,
    /// Another fade already holds the state machine.
    AlreadyActive,
}

struct EnginePair {
    active: Arc<dyn PlayerHandle>,
    standby: Arc<dyn PlayerHandle>,
}

/// Timed transition between the active and standby playback engines.
///
/// All entry points take `&self`; the controller is designed to be shared
/// behind an `Arc` between the engine facade and background tasks.
pub struct CrossfadeController {
    resolver: Resolver,
    events: EventBus,
    ticks: Arc<dyn TickSource>,
    config: CrossfadeConfig,
    phase: Mutex<CrossfadePhase>,
    pair: Mutex<EnginePair>,
    session_cancel: Mutex<Option<CancellationToken>>,
}

impl CrossfadeController {
    pub fn new(
        resolver: Resolver,
        active: Arc<dyn PlayerHandle>,
        standby: Arc<dyn PlayerHandle>,
        ticks: Arc<dyn TickSource>,
        events: EventBus,
        config: CrossfadeConfig,
    ) -> Self {
        Self {
            resolver,
            events,
            ticks,
            config,
            phase: Mutex::new(CrossfadePhase::Idle),
            pair: Mutex::new(EnginePair { active, standby }),
            session_cancel: Mutex::new(None),
        }
    }

    /// Engine currently carrying audible playback.
    pub fn active_handle(&self) -> Arc<dyn PlayerHandle> {
        self.pair.lock().active.clone()
    }

    /// Engine waiting to take over at the next swap.
    pub fn standby_handle(&self) -> Arc<dyn PlayerHandle> {
        self.pair.lock().standby.clone()
    }

    /// Current phase of the state machine.
    pub fn phase(&self) -> CrossfadePhase {
        *self.phase.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == CrossfadePhase::Idle
    }

    /// Cancel the in-progress fade, if any.
    ///
    /// The session observes the cancellation at its next ramp step or
    /// priming poll and winds down through the abort path. Returns whether
    /// a session was signalled.
    pub fn cancel(&self) -> bool {
        match self.session_cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Start a crossfade into `next` when the active track is inside the
    /// overlap window.
    ///
    /// Returns [`CrossfadeOutcome::NotDue`] when `remaining` still exceeds
    /// the configured overlap and [`CrossfadeOutcome::AlreadyActive`] when
    /// another fade holds the machine. Failures surface as
    /// [`PlaybackError::CrossfadeAborted`] after cleanup; the previously
    /// active engine keeps playing unfaded.
    #[instrument(skip(self, next), fields(reference = %next.reference))]
    pub async fn begin_crossfade_if_due(
        &self,
        next: &TrackInfo,
        remaining: Duration,
    ) -> Result<CrossfadeOutcome> {
        if remaining > self.config.overlap {
            return Ok(CrossfadeOutcome::NotDue);
        }

        // Check-and-set under one lock hold; losers bail out without
        // touching either engine.
        {
            let mut phase = self.phase.lock();
            if *phase != CrossfadePhase::Idle {
                debug!(current = ?*phase, "Crossfade already in progress, rejecting");
                return Ok(CrossfadeOutcome::AlreadyActive);
            }
            *phase = CrossfadePhase::Priming;
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        *self.session_cancel.lock() = Some(cancel.clone());

        let result = self.run_session(&session_id, next, remaining, &cancel).await;
        *self.session_cancel.lock() = None;

        match result {
            Ok(()) => {
                *self.phase.lock() = CrossfadePhase::Idle;
                Ok(CrossfadeOutcome::Completed)
            }
            Err(reason) => {
                *self.phase.lock() = CrossfadePhase::Aborted;
                warn!(session_id = %session_id, %reason, "Crossfade aborted");

                // The pair was never swapped on this path, so `standby` is
                // still the engine we primed.
                let standby = self.pair.lock().standby.clone();
                if let Err(error) = standby.stop().await {
                    debug!(%error, "Standby stop during abort failed");
                }
                if let Err(error) = standby.reset().await {
                    debug!(%error, "Standby reset during abort failed");
                }

                self.events
                    .emit(CoreEvent::Crossfade(CrossfadeEvent::Aborted {
                        session_id,
                        reason: reason.clone(),
                    }))
                    .ok();

                *self.phase.lock() = CrossfadePhase::Idle;
                Err(PlaybackError::CrossfadeAborted(reason))
            }
        }
    }

    /// Run one priming + fading + swap pass.
    ///
    /// Returns an abort reason on failure. The fade step restores the
    /// outgoing volume itself before reporting, so the caller only has to
    /// clean up the standby engine.
    async fn run_session(
        &self,
        session_id: &str,
        next: &TrackInfo,
        remaining: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), String> {
        let (active, standby) = {
            let pair = self.pair.lock();
            (pair.active.clone(), pair.standby.clone())
        };

        self.events
            .emit(CoreEvent::Crossfade(CrossfadeEvent::Priming {
                session_id: session_id.to_string(),
                reference: next.reference.to_string(),
            }))
            .ok();

        let stream = self
            .resolver
            .resolve(&next.reference, &next.hints())
            .await
            .map_err(|error| format!("resolution of next track failed: {}", error))?;

        if cancel.is_cancelled() {
            return Err("cancelled while priming".to_string());
        }

        standby
            .load(&stream.url)
            .await
            .map_err(|error| format!("standby load failed: {}", error))?;
        self.wait_until_ready(standby.as_ref(), cancel).await?;

        let outgoing_start = active
            .volume()
            .await
            .map_err(|error| format!("active volume read failed: {}", error))?;

        *self.phase.lock() = CrossfadePhase::Fading;
        let fade = remaining.min(self.config.overlap);

        match self
            .fade_between(
                session_id,
                active.as_ref(),
                standby.as_ref(),
                outgoing_start,
                fade,
                cancel,
            )
            .await
        {
            Ok(()) => {}
            Err(reason) => {
                if let Err(error) = active.set_volume(outgoing_start).await {
                    warn!(%error, "Failed to restore outgoing volume after abort");
                }
                return Err(reason);
            }
        }

        *self.phase.lock() = CrossfadePhase::Swapped;

        // The swap is committed once the ramps finish; outgoing teardown
        // failures are logged rather than unwinding the fade.
        if let Err(error) = active.stop().await {
            warn!(%error, "Outgoing engine stop failed after swap");
        }
        if let Err(error) = active.reset().await {
            warn!(%error, "Outgoing engine reset failed after swap");
        }

        {
            let mut guard = self.pair.lock();
            let pair = &mut *guard;
            std::mem::swap(&mut pair.active, &mut pair.standby);
        }

        self.events
            .emit(CoreEvent::Crossfade(CrossfadeEvent::Swapped {
                session_id: session_id.to_string(),
            }))
            .ok();
        self.events
            .emit(CoreEvent::Crossfade(CrossfadeEvent::TrackChanged {
                reference: next.reference.to_string(),
            }))
            .ok();

        info!(session_id = %session_id, reference = %next.reference, "Crossfade completed");
        Ok(())
    }

    /// Poll the standby engine until it reports ready, bounded by the
    /// configured priming timeout.
    async fn wait_until_ready(
        &self,
        standby: &dyn PlayerHandle,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), String> {
        let mut ticker = self.ticks.interval(self.config.step_interval);

        let poll = async {
            loop {
                match standby.state().await {
                    Ok(PlayerState::Ready | PlayerState::Playing) => return Ok(()),
                    Ok(_) => {}
                    Err(error) => return Err(format!("standby state poll failed: {}", error)),
                }
                ticker.tick().await;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err("cancelled while priming".to_string()),
            outcome = tokio::time::timeout(self.config.priming_ready_timeout, poll) => {
                match outcome {
                    Ok(inner) => inner,
                    Err(_) => Err(format!(
                        "standby engine not ready within {:?}",
                        self.config.priming_ready_timeout
                    )),
                }
            }
        }
    }

    /// Step both volume ramps over `fade` on the shared ticker.
    async fn fade_between(
        &self,
        session_id: &str,
        outgoing: &dyn PlayerHandle,
        incoming: &dyn PlayerHandle,
        outgoing_start: f32,
        fade: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), String> {
        let steps = (fade.as_millis() / self.config.step_interval.as_millis()).max(1) as u32;

        incoming
            .set_volume(0.0)
            .await
            .map_err(|error| format!("incoming volume init failed: {}", error))?;
        incoming
            .play()
            .await
            .map_err(|error| format!("incoming play failed: {}", error))?;

        self.events
            .emit(CoreEvent::Crossfade(CrossfadeEvent::FadeStarted {
                session_id: session_id.to_string(),
                fade_ms: fade.as_millis() as u64,
            }))
            .ok();
        debug!(steps, fade_ms = fade.as_millis() as u64, "Fade ramp started");

        let mut ticker = self.ticks.interval(self.config.step_interval);
        for step in 1..=steps {
            tokio::select! {
                _ = cancel.cancelled() => return Err("cancelled while fading".to_string()),
                _ = ticker.tick() => {}
            }

            let progress = step as f32 / steps as f32;
            let outgoing_volume = self.config.curve.fade_out(progress) * outgoing_start;
            let incoming_volume = self.config.curve.fade_in(progress) * self.config.target_volume;

            outgoing
                .set_volume(outgoing_volume)
                .await
                .map_err(|error| format!("outgoing ramp step failed: {}", error))?;
            incoming
                .set_volume(incoming_volume)
                .await
                .map_err(|error| format!("incoming ramp step failed: {}", error))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{ManualClock, MemoryBlobStore, StubFetcher, StubUrlFactory};
    use crate::cache::{CacheConfig, TierSet};
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::resolve::{
        RemoteResolution, RemoteResolver, ResolveHints, SourceKind, TrackRef,
    };
    use bridge_traits::time::Ticker;

    struct PlayerScript {
        state: PlayerState,
        volume: f32,
        loaded: Option<String>,
        play_calls: u32,
        stop_calls: u32,
        reset_calls: u32,
        volume_log: Vec<f32>,
    }

    /// Scriptable engine stub recording every control call.
    struct StubPlayer {
        script: Mutex<PlayerScript>,
        fail_load: bool,
    }

    impl StubPlayer {
        fn new() -> Self {
            Self {
                script: Mutex::new(PlayerScript {
                    state: PlayerState::Idle,
                    volume: 1.0,
                    loaded: None,
                    play_calls: 0,
                    stop_calls: 0,
                    reset_calls: 0,
                    volume_log: Vec::new(),
                }),
                fail_load: false,
            }
        }

        fn failing_load() -> Self {
            Self {
                fail_load: true,
                ..Self::new()
            }
        }

        fn loaded_url(&self) -> Option<String> {
            self.script.lock().loaded.clone()
        }

        fn current_volume(&self) -> f32 {
            self.script.lock().volume
        }

        fn volume_log(&self) -> Vec<f32> {
            self.script.lock().volume_log.clone()
        }

        fn counts(&self) -> (u32, u32, u32) {
            let script = self.script.lock();
            (script.play_calls, script.stop_calls, script.reset_calls)
        }
    }

    #[async_trait]
    impl PlayerHandle for StubPlayer {
        async fn load(&self, url: &str) -> BridgeResult<()> {
            if self.fail_load {
                return Err(BridgeError::OperationFailed("decoder rejected source".into()));
            }
            let mut script = self.script.lock();
            script.loaded = Some(url.to_string());
            script.state = PlayerState::Ready;
            Ok(())
        }

        async fn play(&self) -> BridgeResult<()> {
            let mut script = self.script.lock();
            script.play_calls += 1;
            script.state = PlayerState::Playing;
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            self.script.lock().state = PlayerState::Paused;
            Ok(())
        }

        async fn stop(&self) -> BridgeResult<()> {
            let mut script = self.script.lock();
            script.stop_calls += 1;
            script.state = PlayerState::Stopped;
            Ok(())
        }

        async fn reset(&self) -> BridgeResult<()> {
            let mut script = self.script.lock();
            script.reset_calls += 1;
            script.state = PlayerState::Idle;
            script.loaded = None;
            Ok(())
        }

        async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
            let mut script = self.script.lock();
            script.volume = volume;
            script.volume_log.push(volume);
            Ok(())
        }

        async fn volume(&self) -> BridgeResult<f32> {
            Ok(self.script.lock().volume)
        }

        async fn position(&self) -> BridgeResult<Duration> {
            Ok(Duration::ZERO)
        }

        async fn duration(&self) -> BridgeResult<Option<Duration>> {
            Ok(None)
        }

        async fn state(&self) -> BridgeResult<PlayerState> {
            Ok(self.script.lock().state)
        }
    }

    /// Ticker that fires as fast as the runtime can poll it.
    struct InstantTicker;

    #[async_trait]
    impl Ticker for InstantTicker {
        async fn tick(&mut self) {
            tokio::task::yield_now().await;
        }
    }

    struct InstantTickSource;

    impl TickSource for InstantTickSource {
        fn interval(&self, _period: Duration) -> Box<dyn Ticker> {
            Box::new(InstantTicker)
        }
    }

    /// Ticker that never fires, pinning the fade mid-ramp.
    struct FrozenTicker;

    #[async_trait]
    impl Ticker for FrozenTicker {
        async fn tick(&mut self) {
            futures::future::pending::<()>().await;
        }
    }

    struct FrozenTickSource;

    impl TickSource for FrozenTickSource {
        fn interval(&self, _period: Duration) -> Box<dyn Ticker> {
            Box::new(FrozenTicker)
        }
    }

    struct DriveRemote;

    #[async_trait]
    impl RemoteResolver for DriveRemote {
        fn kind(&self) -> SourceKind {
            SourceKind::RemoteDrive
        }

        async fn resolve_remote(
            &self,
            reference: &TrackRef,
            _hints: &ResolveHints,
        ) -> BridgeResult<RemoteResolution> {
            Ok(RemoteResolution::new(format!("https://stream/{}", reference)))
        }
    }

    struct Harness {
        controller: Arc<CrossfadeController>,
        first: Arc<StubPlayer>,
        second: Arc<StubPlayer>,
        events: EventBus,
    }

    fn harness_with(
        config: CrossfadeConfig,
        ticks: Arc<dyn TickSource>,
        second: Arc<StubPlayer>,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new());
        let events = EventBus::new(64);
        let tiers = TierSet::from_config(
            &CacheConfig::default(),
            Arc::new(MemoryBlobStore::default()),
            clock.clone(),
        );
        let resolver = Resolver::new(
            tiers,
            vec![Arc::new(DriveRemote) as Arc<dyn RemoteResolver>],
            Arc::new(StubFetcher::new("bytes")),
            Arc::new(StubUrlFactory::default()),
            events.clone(),
            clock,
            Duration::from_secs(2),
            Duration::from_secs(5),
        );

        let first = Arc::new(StubPlayer::new());
        let controller = Arc::new(CrossfadeController::new(
            resolver,
            first.clone(),
            second.clone(),
            ticks,
            events.clone(),
            config,
        ));

        Harness {
            controller,
            first,
            second,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(
            CrossfadeConfig::default(),
            Arc::new(InstantTickSource),
            Arc::new(StubPlayer::new()),
        )
    }

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<CrossfadeEvent> {
        let mut crossfade_events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let CoreEvent::Crossfade(event) = event {
                crossfade_events.push(event);
            }
        }
        crossfade_events
    }

    fn next_track() -> TrackInfo {
        TrackInfo::new(TrackRef::new("drive://next"))
    }

    fn same_player(a: &Arc<StubPlayer>, b: &Arc<dyn PlayerHandle>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(a) as *const u8,
            Arc::as_ptr(b) as *const u8,
        )
    }

    #[test]
    fn test_config_validation() {
        assert!(CrossfadeConfig::default().validate().is_ok());
        assert!(CrossfadeConfig::default()
            .with_step_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(CrossfadeConfig::default()
            .with_target_volume(1.5)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_not_due_outside_overlap_window() {
        let harness = harness();

        let outcome = harness
            .controller
            .begin_crossfade_if_due(&next_track(), Duration::from_secs(30))
            .await
            .unwrap();

        assert_eq!(outcome, CrossfadeOutcome::NotDue);
        assert!(harness.controller.is_idle());
        assert!(harness.second.loaded_url().is_none());
    }

    #[tokio::test]
    async fn test_completed_fade_swaps_handles() {
        let harness = harness();
        let mut receiver = harness.events.subscribe();

        let outcome = harness
            .controller
            .begin_crossfade_if_due(&next_track(), Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(outcome, CrossfadeOutcome::Completed);
        assert!(harness.controller.is_idle());

        // Standby took over playback at full target volume.
        assert_eq!(
            harness.second.loaded_url().as_deref(),
            Some("https://stream/drive://next")
        );
        let (play_calls, _, _) = harness.second.counts();
        assert_eq!(play_calls, 1);
        assert!((harness.second.current_volume() - 1.0).abs() < 0.001);

        // Outgoing engine was stopped and reset after the swap.
        let (_, stop_calls, reset_calls) = harness.first.counts();
        assert_eq!(stop_calls, 1);
        assert_eq!(reset_calls, 1);

        // The handles traded places.
        assert!(same_player(
            &harness.second,
            &harness.controller.active_handle()
        ));

        let events = drain(&mut receiver);
        let changed = events
            .iter()
            .filter(|event| matches!(event, CrossfadeEvent::TrackChanged { .. }))
            .count();
        assert_eq!(changed, 1);
        assert!(events
            .iter()
            .any(|event| matches!(event, CrossfadeEvent::Swapped { .. })));
    }

    #[tokio::test]
    async fn test_fade_duration_capped_by_remaining() {
        let harness = harness();
        let mut receiver = harness.events.subscribe();

        harness
            .controller
            .begin_crossfade_if_due(&next_track(), Duration::from_secs(2))
            .await
            .unwrap();

        let events = drain(&mut receiver);
        let fade_ms = events.iter().find_map(|event| match event {
            CrossfadeEvent::FadeStarted { fade_ms, .. } => Some(*fade_ms),
            _ => None,
        });
        assert_eq!(fade_ms, Some(2_000));
    }

    #[tokio::test]
    async fn test_outgoing_ramp_is_monotonic() {
        let harness = harness();

        harness
            .controller
            .begin_crossfade_if_due(&next_track(), Duration::from_secs(1))
            .await
            .unwrap();

        let ramp = harness.first.volume_log();
        assert!(!ramp.is_empty());
        assert!(ramp.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(ramp.last().copied().unwrap() < 0.001);
    }

    #[tokio::test]
    async fn test_concurrent_fade_is_rejected() {
        let harness = harness();

        let track_a = next_track();
        let track_b = next_track();
        let (first, second) = tokio::join!(
            harness
                .controller
                .begin_crossfade_if_due(&track_a, Duration::from_secs(3)),
            harness
                .controller
                .begin_crossfade_if_due(&track_b, Duration::from_secs(3)),
        );

        let outcomes = [first.unwrap(), second.unwrap()];
        assert!(outcomes.contains(&CrossfadeOutcome::Completed));
        assert!(outcomes.contains(&CrossfadeOutcome::AlreadyActive));
    }

    #[tokio::test]
    async fn test_load_failure_aborts_without_swap() {
        let harness = harness_with(
            CrossfadeConfig::default(),
            Arc::new(InstantTickSource),
            Arc::new(StubPlayer::failing_load()),
        );
        let mut receiver = harness.events.subscribe();

        let error = harness
            .controller
            .begin_crossfade_if_due(&next_track(), Duration::from_secs(3))
            .await
            .unwrap_err();

        assert!(matches!(error, PlaybackError::CrossfadeAborted(_)));
        assert!(error.is_non_fatal());
        assert!(harness.controller.is_idle());

        // The active engine never changed hands or volume.
        assert!(same_player(
            &harness.first,
            &harness.controller.active_handle()
        ));
        assert!(harness.first.volume_log().is_empty());

        let events = drain(&mut receiver);
        assert!(events
            .iter()
            .any(|event| matches!(event, CrossfadeEvent::Aborted { .. })));
        assert!(!events
            .iter()
            .any(|event| matches!(event, CrossfadeEvent::TrackChanged { .. })));
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts() {
        let harness = harness();

        // catalog:// has no registered remote in the harness.
        let unknown = TrackInfo::new(TrackRef::new("catalog://nowhere"));
        let error = harness
            .controller
            .begin_crossfade_if_due(&unknown, Duration::from_secs(3))
            .await
            .unwrap_err();

        assert!(matches!(error, PlaybackError::CrossfadeAborted(_)));
        assert!(harness.controller.is_idle());
        assert!(harness.second.loaded_url().is_none());
    }

    #[tokio::test]
    async fn test_cancel_stops_fade_and_restores_volume() {
        let harness = harness_with(
            CrossfadeConfig::default(),
            Arc::new(FrozenTickSource),
            Arc::new(StubPlayer::new()),
        );

        let controller = harness.controller.clone();
        let session = tokio::spawn(async move {
            controller
                .begin_crossfade_if_due(&next_track(), Duration::from_secs(3))
                .await
        });

        // Let the session prime and enter the fade before cancelling.
        while harness.controller.phase() != CrossfadePhase::Fading {
            tokio::task::yield_now().await;
        }
        assert!(harness.controller.cancel());

        let error = session.await.unwrap().unwrap_err();
        assert!(matches!(error, PlaybackError::CrossfadeAborted(_)));
        assert!(harness.controller.is_idle());

        // Outgoing volume restored, standby wound down.
        assert!((harness.first.current_volume() - 1.0).abs() < 0.001);
        let (_, stop_calls, reset_calls) = harness.second.counts();
        assert!(stop_calls >= 1);
        assert!(reset_calls >= 1);
    }

    #[tokio::test]
    async fn test_cancel_without_session_is_a_no_op() {
        let harness = harness();
        assert!(!harness.controller.cancel());
    }
}
