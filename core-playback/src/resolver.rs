//! Track resolution pipeline
//!
//! Turns a logical [`TrackRef`] into a playable URL by walking the cache
//! hierarchy and falling through to the registered remote resolver on a
//! miss. Concurrent resolutions of the same reference share one in-flight
//! network attempt. Slower-tier hits schedule background promotion into the
//! byte tiers so the next lookup lands higher.
//!
//! Failure discipline: only a definitive not-found verdict from a remote
//! resolver marks a reference unavailable. Timeouts and transport failures
//! leave the negative cache untouched.

use bridge_traits::http::ByteFetcher;
use bridge_traits::playback::MediaUrlFactory;
use bridge_traits::resolve::{RemoteResolution, RemoteResolver, ResolveHints, SourceKind, TrackRef};
use bridge_traits::storage::StoredBlob;
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_runtime::events::{CacheEvent, CacheTier, CoreEvent, EventBus, ResolveEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::cache::hot::UrlHit;
use crate::cache::TierSet;
use crate::error::{PlaybackError, Result};

/// Outcome of a successful resolution: a URL the platform engine can load.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStream {
    /// Playable URL.
    pub url: String,
    /// Provider expiry hint, when the resolution came from the network.
    pub expires_hint: Option<DateTime<Utc>>,
    /// Track duration in seconds, when reported.
    pub duration: Option<f64>,
}

impl ResolvedStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_hint: None,
            duration: None,
        }
    }
}

impl From<RemoteResolution> for ResolvedStream {
    fn from(resolution: RemoteResolution) -> Self {
        Self {
            url: resolution.url,
            expires_hint: resolution.expires_hint,
            duration: resolution.duration,
        }
    }
}

/// Cloneable failure carried through the shared in-flight future.
///
/// [`PlaybackError`] is not `Clone` (it wraps IO errors), so the pending
/// registry stores this reduced form and converts at the edge.
#[derive(Debug, Clone)]
enum ResolveFailure {
    KnownUnavailable(String),
    Timeout(Duration),
    Network(String),
    InvalidResponse(String),
}

impl From<ResolveFailure> for PlaybackError {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::KnownUnavailable(reference) => {
                PlaybackError::KnownUnavailable(reference)
            }
            ResolveFailure::Timeout(duration) => PlaybackError::Timeout(duration),
            ResolveFailure::Network(message) => PlaybackError::NetworkFailure(message),
            ResolveFailure::InvalidResponse(message) => PlaybackError::InvalidResponse(message),
        }
    }
}

type PendingResolve = Shared<BoxFuture<'static, std::result::Result<ResolvedStream, ResolveFailure>>>;

struct ResolverInner {
    tiers: TierSet,
    remotes: HashMap<SourceKind, Arc<dyn RemoteResolver>>,
    fetcher: Arc<dyn ByteFetcher>,
    url_factory: Arc<dyn MediaUrlFactory>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    resolve_timeout: Duration,
    promotion_timeout: Duration,
    pending: Mutex<HashMap<TrackRef, PendingResolve>>,
}

/// Tier-walking resolver with request de-duplication.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tiers: TierSet,
        remotes: Vec<Arc<dyn RemoteResolver>>,
        fetcher: Arc<dyn ByteFetcher>,
        url_factory: Arc<dyn MediaUrlFactory>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        resolve_timeout: Duration,
        promotion_timeout: Duration,
    ) -> Self {
        let remotes = remotes
            .into_iter()
            .map(|remote| (remote.kind(), remote))
            .collect();

        Self {
            inner: Arc::new(ResolverInner {
                tiers,
                remotes,
                fetcher,
                url_factory,
                events,
                clock,
                resolve_timeout,
                promotion_timeout,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn tiers(&self) -> &TierSet {
        &self.inner.tiers
    }

    /// Resolve a reference to a playable URL, checking tiers from fastest to
    /// slowest before dispatching to the network.
    #[instrument(skip(self, hints), fields(reference = %reference))]
    pub async fn resolve(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
    ) -> Result<ResolvedStream> {
        let started = Instant::now();

        match self.resolve_inner(reference, hints).await {
            Ok((stream, tier)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                debug!(%tier, elapsed_ms, "Reference resolved");
                self.inner
                    .events
                    .emit(CoreEvent::Resolve(ResolveEvent::Resolved {
                        reference: reference.to_string(),
                        tier,
                        elapsed_ms,
                    }))
                    .ok();
                Ok(stream)
            }
            Err(error) => {
                self.inner
                    .events
                    .emit(CoreEvent::Resolve(ResolveEvent::Failed {
                        reference: reference.to_string(),
                        message: error.to_string(),
                        recoverable: error.is_transient(),
                    }))
                    .ok();
                Err(error)
            }
        }
    }

    async fn resolve_inner(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
    ) -> Result<(ResolvedStream, CacheTier)> {
        let inner = &self.inner;

        if inner.tiers.negative.contains(reference) {
            return Err(PlaybackError::KnownUnavailable(reference.to_string()));
        }

        if let Some(hit) = inner.tiers.l0.get(reference) {
            return Ok((ResolvedStream::new(hit.url), CacheTier::L0));
        }

        if let Some(blob) = inner.tiers.durable.get(reference).await? {
            let stream = self.serve_durable_hit(reference, blob).await?;
            return Ok((stream, CacheTier::Durable));
        }

        if let Some(hit) = inner.tiers.hot.get(reference) {
            self.spawn_promotion(reference, &hit, CacheTier::Hot);
            return Ok((ResolvedStream::new(hit.url), CacheTier::Hot));
        }

        if let Some(hit) = inner.tiers.warm.get(reference) {
            self.spawn_promotion(reference, &hit, CacheTier::Warm);
            return Ok((ResolvedStream::new(hit.url), CacheTier::Warm));
        }

        let stream = self
            .resolve_via_network(reference, hints, CacheTier::Hot)
            .await?;
        Ok((stream, CacheTier::Network))
    }

    /// Speculatively resolve a reference on behalf of the preloader.
    ///
    /// Does nothing when any tier already holds the reference. A fresh
    /// network resolution lands in the warm tier and skips byte promotion;
    /// the first real playback request upgrades it.
    pub async fn resolve_speculative(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
    ) -> Result<()> {
        let inner = &self.inner;

        if inner.tiers.negative.contains(reference)
            || inner.tiers.l0.contains(reference)
            || inner.tiers.hot.contains(reference)
            || inner.tiers.warm.get(reference).is_some()
        {
            return Ok(());
        }

        if inner.tiers.durable.created_at(reference).await?.is_some() {
            return Ok(());
        }

        self.resolve_via_network(reference, hints, CacheTier::Warm)
            .await?;
        Ok(())
    }

    /// Materialize a durable hit into the instant tier and serve its URL.
    async fn serve_durable_hit(
        &self,
        reference: &TrackRef,
        blob: StoredBlob,
    ) -> Result<ResolvedStream> {
        let inner = &self.inner;
        let handle = inner.url_factory.materialize(blob.data.clone()).await?;
        let url = handle.url().to_string();

        if let Some(evicted) =
            inner
                .tiers
                .l0
                .insert(reference.clone(), blob.data, handle, blob.meta.created_at)
        {
            inner
                .events
                .emit(CoreEvent::Cache(CacheEvent::Evicted {
                    tier: CacheTier::L0,
                    reference: evicted.reference.to_string(),
                }))
                .ok();
            if let Err(error) = inner.url_factory.release(evicted.handle).await {
                warn!(%error, "Failed to release evicted media URL");
            }
        }

        inner
            .events
            .emit(CoreEvent::Cache(CacheEvent::Promoted {
                from: CacheTier::Durable,
                to: CacheTier::L0,
                reference: reference.to_string(),
            }))
            .ok();

        Ok(ResolvedStream::new(url))
    }

    /// Kick off a fetch-and-promote task for a URL-tier hit. Never delays
    /// the caller; failures are logged and swallowed.
    fn spawn_promotion(&self, reference: &TrackRef, hit: &UrlHit, from: CacheTier) {
        tokio::spawn(ResolverInner::promote_bytes(
            self.inner.clone(),
            reference.clone(),
            hit.url.clone(),
            hit.created_at,
            from,
        ));
    }

    async fn resolve_via_network(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
        target: CacheTier,
    ) -> Result<ResolvedStream> {
        let inner = &self.inner;

        let kind = reference
            .source_kind()
            .ok_or_else(|| PlaybackError::UnknownSource(reference.to_string()))?;
        let remote = inner
            .remotes
            .get(&kind)
            .cloned()
            .ok_or_else(|| PlaybackError::UnknownSource(kind.to_string()))?;

        let shared = {
            let mut pending = inner.pending.lock();
            match pending.get(reference) {
                Some(existing) => existing.clone(),
                None => {
                    let future = ResolverInner::network_resolve(
                        inner.clone(),
                        reference.clone(),
                        hints.clone(),
                        remote,
                        target,
                    )
                    .boxed()
                    .shared();
                    pending.insert(reference.clone(), future.clone());
                    future
                }
            }
        };

        let outcome = shared.clone().await;

        {
            let mut pending = inner.pending.lock();
            // Only the entry this call observed may be cleared; a newer
            // attempt could already occupy the slot.
            if let Some(current) = pending.get(reference) {
                if current.ptr_eq(&shared) {
                    pending.remove(reference);
                }
            }
        }

        outcome.map_err(PlaybackError::from)
    }
}

impl ResolverInner {
    /// The single shared network attempt for a reference.
    ///
    /// `target` picks the URL tier a success lands in: hot for foreground
    /// resolution, warm for speculative preloading.
    async fn network_resolve(
        inner: Arc<ResolverInner>,
        reference: TrackRef,
        hints: ResolveHints,
        remote: Arc<dyn RemoteResolver>,
        target: CacheTier,
    ) -> std::result::Result<ResolvedStream, ResolveFailure> {
        let outcome = tokio::time::timeout(
            inner.resolve_timeout,
            remote.resolve_remote(&reference, &hints),
        )
        .await;

        let resolution = match outcome {
            Err(_) => {
                // A hung provider is indistinguishable from a slow one; the
                // reference stays resolvable.
                warn!(
                    reference = %reference,
                    timeout = ?inner.resolve_timeout,
                    "Remote resolution timed out"
                );
                return Err(ResolveFailure::Timeout(inner.resolve_timeout));
            }
            Ok(Err(error)) if error.is_not_found() => {
                inner.tiers.negative.insert(reference.clone());
                inner
                    .events
                    .emit(CoreEvent::Resolve(ResolveEvent::MarkedUnavailable {
                        reference: reference.to_string(),
                    }))
                    .ok();
                return Err(ResolveFailure::KnownUnavailable(reference.to_string()));
            }
            Ok(Err(error)) => return Err(ResolveFailure::Network(error.to_string())),
            Ok(Ok(resolution)) => resolution,
        };

        if resolution.url.trim().is_empty() {
            return Err(ResolveFailure::InvalidResponse(format!(
                "resolver for {} returned an empty URL",
                reference
            )));
        }

        let created_at = inner.clock.now();
        match target {
            CacheTier::Warm => {
                inner.tiers.warm.insert(
                    reference.clone(),
                    resolution.url.clone(),
                    resolution.expires_hint,
                );
            }
            _ => {
                inner.tiers.hot.insert(
                    reference.clone(),
                    resolution.url.clone(),
                    resolution.expires_hint,
                );
            }
        }
        inner
            .events
            .emit(CoreEvent::Cache(CacheEvent::Populated {
                tier: target,
                reference: reference.to_string(),
                size_bytes: None,
            }))
            .ok();

        if target != CacheTier::Warm {
            tokio::spawn(ResolverInner::promote_bytes(
                inner.clone(),
                reference,
                resolution.url.clone(),
                created_at,
                CacheTier::Network,
            ));
        }

        Ok(ResolvedStream::from(resolution))
    }

    /// Fetch the payload behind a resolved URL and settle it into the byte
    /// tiers. Writes carry the resolution's creation time so a slow fetch
    /// never clobbers fresher bytes.
    async fn promote_bytes(
        inner: Arc<ResolverInner>,
        reference: TrackRef,
        url: String,
        created_at: DateTime<Utc>,
        from: CacheTier,
    ) {
        if let Some(existing) = inner.tiers.l0.created_at(&reference) {
            if existing >= created_at {
                return;
            }
        }

        let bytes = match tokio::time::timeout(
            inner.promotion_timeout,
            inner.fetcher.fetch_bytes(&url),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(error)) => {
                debug!(reference = %reference, %error, "Promotion fetch failed");
                return;
            }
            Err(_) => {
                debug!(
                    reference = %reference,
                    timeout = ?inner.promotion_timeout,
                    "Promotion fetch timed out"
                );
                return;
            }
        };

        match inner
            .tiers
            .durable
            .put_if_newer(&reference, bytes.clone(), created_at)
            .await
        {
            Ok(true) => {
                inner
                    .events
                    .emit(CoreEvent::Cache(CacheEvent::Populated {
                        tier: CacheTier::Durable,
                        reference: reference.to_string(),
                        size_bytes: Some(bytes.len() as u64),
                    }))
                    .ok();
            }
            Ok(false) => {
                // A fresher write landed first; its own promotion owns L0.
                return;
            }
            Err(error) => {
                debug!(reference = %reference, %error, "Durable backfill failed");
            }
        }

        let handle = match inner.url_factory.materialize(bytes.clone()).await {
            Ok(handle) => handle,
            Err(error) => {
                debug!(reference = %reference, %error, "Materialization failed during promotion");
                return;
            }
        };

        if let Some(evicted) = inner
            .tiers
            .l0
            .insert(reference.clone(), bytes, handle, created_at)
        {
            inner
                .events
                .emit(CoreEvent::Cache(CacheEvent::Evicted {
                    tier: CacheTier::L0,
                    reference: evicted.reference.to_string(),
                }))
                .ok();
            if let Err(error) = inner.url_factory.release(evicted.handle).await {
                warn!(%error, "Failed to release evicted media URL");
            }
        }

        inner
            .events
            .emit(CoreEvent::Cache(CacheEvent::Promoted {
                from,
                to: CacheTier::L0,
                reference: reference.to_string(),
            }))
            .ok();
    }
}
