//! Predictive preloading
//!
//! Watches active-track changes, scores queue candidates against a rolling
//! listening context, and speculatively resolves the most likely next tracks
//! so the warm tier already holds their URLs when playback reaches them.
//! Entirely advisory: failures are logged at debug and never surfaced, and a
//! newer track change supersedes any cycle still dispatching.

use bridge_traits::resolve::{ResolveHints, TrackInfo, TrackRef};
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::resolver::Resolver;

const WEIGHT_SAME_ARTIST: f64 = 0.4;
const WEIGHT_SAME_GENRE: f64 = 0.3;
const WEIGHT_RECENT_GENRE: f64 = 0.2;
const WEIGHT_RECENT_ARTIST: f64 = 0.2;
const WEIGHT_PLAYED_RECENTLY: f64 = 0.15;
const WEIGHT_TIME_OF_DAY: f64 = 0.15;

const GENRE_WINDOW: usize = 5;
const ARTIST_WINDOW: usize = 5;
const HISTORY_WINDOW: usize = 50;

const CONTEXT_SETTINGS_KEY: &str = "preload.prediction_context";

/// Configuration for the predictive preloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Minimum score a candidate needs to be preloaded (default: 0.3)
    pub score_threshold: f64,

    /// Maximum candidates preloaded per cycle (default: 5)
    pub max_candidates: usize,

    /// Delay between speculative dispatches within one cycle (default: 150ms)
    pub stagger: Duration,

    /// Upper bound of the random score jitter (default: 0.1)
    pub jitter_max: f64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.3,
            max_candidates: 5,
            stagger: Duration::from_millis(150),
            jitter_max: 0.1,
        }
    }
}

impl PreloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }

    pub fn with_max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_jitter_max(mut self, jitter: f64) -> Self {
        self.jitter_max = jitter;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err("score_threshold must be within [0.0, 1.0]".to_string());
        }

        if self.max_candidates == 0 {
            return Err("max_candidates must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.jitter_max) {
            return Err("jitter_max must be within [0.0, 1.0]".to_string());
        }

        Ok(())
    }
}

/// One remembered play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub reference: TrackRef,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub played_at: DateTime<Utc>,
}

/// Rolling listening context the scorer consults.
///
/// Mutated exactly once per active-track change and persisted best-effort;
/// losing it only costs warm-up accuracy after a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    pub recent_genres: VecDeque<String>,
    pub recent_artists: VecDeque<String>,
    pub history: VecDeque<PlayRecord>,
}

impl PredictionContext {
    /// Fold a newly active track into the rolling windows.
    pub fn record_play(&mut self, track: &TrackInfo, now: DateTime<Utc>) {
        if let Some(genre) = &track.genre {
            push_window(&mut self.recent_genres, genre.clone(), GENRE_WINDOW);
        }
        if let Some(artist) = &track.artist {
            push_window(&mut self.recent_artists, artist.clone(), ARTIST_WINDOW);
        }

        self.history.push_front(PlayRecord {
            reference: track.reference.clone(),
            artist: track.artist.clone(),
            genre: track.genre.clone(),
            played_at: now,
        });
        self.history.truncate(HISTORY_WINDOW);
    }
}

fn push_window(window: &mut VecDeque<String>, value: String, cap: usize) {
    window.retain(|existing| existing != &value);
    window.push_front(value);
    window.truncate(cap);
}

/// Score assigned to one candidate during a prediction cycle.
#[derive(Debug, Clone)]
pub struct PredictionScore {
    pub reference: TrackRef,
    /// Relevance in `[0, 1]`.
    pub score: f64,
    /// Signals that contributed.
    pub reasons: Vec<String>,
}

/// Scores upcoming candidates and warms the cache for the likely next plays.
pub struct PredictivePreloader {
    resolver: Resolver,
    settings: Option<Arc<dyn SettingsStore>>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: PreloadConfig,
    generation: Arc<AtomicU64>,
    context: Mutex<PredictionContext>,
}

impl PredictivePreloader {
    pub fn new(
        resolver: Resolver,
        settings: Option<Arc<dyn SettingsStore>>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: PreloadConfig,
    ) -> Self {
        Self {
            resolver,
            settings,
            events,
            clock,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            context: Mutex::new(PredictionContext::default()),
        }
    }

    /// Restore the persisted context, if any. Unreadable state starts fresh.
    pub async fn load_context(&self) {
        let Some(settings) = &self.settings else {
            return;
        };

        match settings.get_string(CONTEXT_SETTINGS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<PredictionContext>(&json) {
                Ok(context) => {
                    debug!(
                        history = context.history.len(),
                        "Restored prediction context"
                    );
                    *self.context.lock() = context;
                }
                Err(error) => {
                    debug!(%error, "Stored prediction context is unreadable, starting fresh");
                }
            },
            Ok(None) => {}
            Err(error) => debug!(%error, "Failed to load prediction context"),
        }
    }

    /// Snapshot of the current context.
    pub fn context(&self) -> PredictionContext {
        self.context.lock().clone()
    }

    /// Generation counter of the newest prediction cycle.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invalidate the current cycle so any staggered dispatches still
    /// waiting bail out at their next generation check.
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// React to a new active track: update the context once, score the
    /// queue, and fire speculative resolutions for the best candidates.
    #[instrument(skip(self, current, candidates), fields(current = %current.reference))]
    pub async fn on_active_track_changed(&self, current: &TrackInfo, candidates: &[TrackInfo]) {
        let cycle = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.clock.now();

        let context = {
            let mut context = self.context.lock();
            context.record_play(current, now);
            context.clone()
        };

        self.save_context(&context).await;

        self.events
            .emit(CoreEvent::Preload(PreloadEvent::CycleStarted {
                current: current.reference.to_string(),
                candidate_count: candidates.len(),
            }))
            .ok();

        let selected = self.select(current, candidates, &context, now);
        if selected.is_empty() {
            return;
        }

        for prediction in &selected {
            self.events
                .emit(CoreEvent::Preload(PreloadEvent::CandidateSelected {
                    reference: prediction.reference.to_string(),
                    score: prediction.score,
                    reasons: prediction.reasons.clone(),
                }))
                .ok();
        }

        let jobs: Vec<(TrackRef, ResolveHints)> = selected
            .iter()
            .map(|prediction| {
                let hints = candidates
                    .iter()
                    .find(|candidate| candidate.reference == prediction.reference)
                    .map(|candidate| candidate.hints())
                    .unwrap_or_default();
                (prediction.reference.clone(), hints)
            })
            .collect();

        let resolver = self.resolver.clone();
        let events = self.events.clone();
        let generation = self.generation.clone();
        let stagger = self.config.stagger;

        tokio::spawn(async move {
            for (index, (reference, hints)) in jobs.into_iter().enumerate() {
                if index > 0 {
                    tokio::time::sleep(stagger).await;
                }

                if generation.load(Ordering::SeqCst) != cycle {
                    events
                        .emit(CoreEvent::Preload(PreloadEvent::Superseded {
                            generation: cycle,
                        }))
                        .ok();
                    return;
                }

                match resolver.resolve_speculative(&reference, &hints).await {
                    Ok(()) => {
                        events
                            .emit(CoreEvent::Preload(PreloadEvent::Completed {
                                reference: reference.to_string(),
                            }))
                            .ok();
                    }
                    Err(error) => {
                        debug!(reference = %reference, %error, "Speculative resolution failed");
                        events
                            .emit(CoreEvent::Preload(PreloadEvent::Failed {
                                reference: reference.to_string(),
                                message: error.to_string(),
                            }))
                            .ok();
                    }
                }
            }
        });
    }

    /// Score every candidate and keep the best ones above the threshold.
    pub fn select(
        &self,
        current: &TrackInfo,
        candidates: &[TrackInfo],
        context: &PredictionContext,
        now: DateTime<Utc>,
    ) -> Vec<PredictionScore> {
        let mut scored: Vec<PredictionScore> = candidates
            .iter()
            .filter(|candidate| candidate.reference != current.reference)
            .map(|candidate| self.score(candidate, current, context, now))
            .filter(|prediction| prediction.score >= self.config.score_threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.config.max_candidates);
        scored
    }

    /// Weighted additive relevance score, clamped to `[0, 1]`.
    pub fn score(
        &self,
        candidate: &TrackInfo,
        current: &TrackInfo,
        context: &PredictionContext,
        now: DateTime<Utc>,
    ) -> PredictionScore {
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if let (Some(a), Some(b)) = (&candidate.artist, &current.artist) {
            if a == b {
                score += WEIGHT_SAME_ARTIST;
                reasons.push("same artist as current".to_string());
            }
        }

        if let (Some(a), Some(b)) = (&candidate.genre, &current.genre) {
            if a == b {
                score += WEIGHT_SAME_GENRE;
                reasons.push("same genre as current".to_string());
            }
        }

        if let Some(genre) = &candidate.genre {
            if context.recent_genres.contains(genre) {
                score += WEIGHT_RECENT_GENRE;
                reasons.push("genre in recent rotation".to_string());
            }
        }

        if let Some(artist) = &candidate.artist {
            if context.recent_artists.contains(artist) {
                score += WEIGHT_RECENT_ARTIST;
                reasons.push("artist in recent rotation".to_string());
            }
        }

        let day_ago = now - ChronoDuration::hours(24);
        if context
            .history
            .iter()
            .any(|record| record.reference == candidate.reference && record.played_at > day_ago)
        {
            score += WEIGHT_PLAYED_RECENTLY;
            reasons.push("played in the last day".to_string());
        }

        if let Some(genre) = &candidate.genre {
            let affinity = time_of_day_affinity(context, genre, now);
            if affinity > 0.0 {
                score += WEIGHT_TIME_OF_DAY * affinity;
                reasons.push("genre fits this time of day".to_string());
            }
        }

        if self.config.jitter_max > 0.0 {
            score += rand::random::<f64>() * self.config.jitter_max;
        }

        PredictionScore {
            reference: candidate.reference.clone(),
            score: score.clamp(0.0, 1.0),
            reasons,
        }
    }

    async fn save_context(&self, context: &PredictionContext) {
        let Some(settings) = &self.settings else {
            return;
        };

        match serde_json::to_string(context) {
            Ok(json) => {
                if let Err(error) = settings.set_string(CONTEXT_SETTINGS_KEY, &json).await {
                    debug!(%error, "Failed to persist prediction context");
                }
            }
            Err(error) => debug!(%error, "Failed to serialize prediction context"),
        }
    }
}

/// Fraction of same-time-of-day plays that match `genre`.
///
/// The day is split into four 6-hour buckets; a genre the listener favors
/// in this bucket scores proportionally.
fn time_of_day_affinity(context: &PredictionContext, genre: &str, now: DateTime<Utc>) -> f64 {
    let bucket = hour_bucket(now);
    let mut in_bucket = 0usize;
    let mut matching = 0usize;

    for record in &context.history {
        if hour_bucket(record.played_at) == bucket {
            in_bucket += 1;
            if record.genre.as_deref() == Some(genre) {
                matching += 1;
            }
        }
    }

    if in_bucket == 0 {
        return 0.0;
    }

    matching as f64 / in_bucket as f64
}

fn hour_bucket(at: DateTime<Utc>) -> u32 {
    at.hour() / 6
}
