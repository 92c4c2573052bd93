//! Prediction cycles driven end to end: candidate selection feeding the
//! resolver, warm-tier population, supersede semantics and advisory failures.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::ByteFetcher;
use bridge_traits::playback::{MediaUrlFactory, MediaUrlHandle};
use bridge_traits::resolve::{
    RemoteResolution, RemoteResolver, ResolveHints, SourceKind, TrackInfo, TrackRef,
};
use bridge_traits::storage::{BlobListEntry, BlobMeta, BlobStore, StoredBlob};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_playback::cache::{CacheConfig, TierSet};
use core_playback::preload::{PredictivePreloader, PreloadConfig};
use core_playback::resolver::Resolver;
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent, ResolveEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

// ============================================================================
// Bridge stubs
// ============================================================================

#[derive(Default)]
struct MemoryBlobStore {
    blobs: Mutex<HashMap<TrackRef, StoredBlob>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &TrackRef) -> BridgeResult<Option<StoredBlob>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn put(&self, key: &TrackRef, data: Bytes, meta: BlobMeta) -> BridgeResult<()> {
        self.blobs.lock().insert(key.clone(), StoredBlob { data, meta });
        Ok(())
    }

    async fn update_meta(&self, key: &TrackRef, meta: BlobMeta) -> BridgeResult<()> {
        if let Some(blob) = self.blobs.lock().get_mut(key) {
            blob.meta = meta;
        }
        Ok(())
    }

    async fn delete(&self, key: &TrackRef) -> BridgeResult<()> {
        self.blobs.lock().remove(key);
        Ok(())
    }

    async fn list_all(&self) -> BridgeResult<Vec<BlobListEntry>> {
        Ok(self
            .blobs
            .lock()
            .iter()
            .map(|(key, blob)| BlobListEntry {
                key: key.clone(),
                meta: blob.meta.clone(),
            })
            .collect())
    }
}

#[derive(Default)]
struct StubUrlFactory {
    counter: AtomicU64,
}

#[async_trait]
impl MediaUrlFactory for StubUrlFactory {
    async fn materialize(&self, _data: Bytes) -> BridgeResult<MediaUrlHandle> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(MediaUrlHandle::new(format!("blob:mem-{}", n)))
    }

    async fn release(&self, _handle: MediaUrlHandle) -> BridgeResult<()> {
        Ok(())
    }
}

/// Fetcher that counts calls; speculative resolutions must never fetch.
#[derive(Default)]
struct CountingFetcher {
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ByteFetcher for CountingFetcher {
    async fn fetch_bytes(&self, _url: &str) -> BridgeResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"audio"))
    }

    async fn fetch_stream(
        &self,
        _url: &str,
    ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        Err(BridgeError::OperationFailed(
            "streaming not supported by test fetcher".to_string(),
        ))
    }
}

/// Catalog resolver answering from a URL template, optionally refusing.
struct TemplateRemote {
    found: bool,
    calls: AtomicUsize,
}

impl TemplateRemote {
    fn serving() -> Self {
        Self {
            found: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn not_found() -> Self {
        Self {
            found: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteResolver for TemplateRemote {
    fn kind(&self) -> SourceKind {
        SourceKind::Catalog
    }

    async fn resolve_remote(
        &self,
        reference: &TrackRef,
        _hints: &ResolveHints,
    ) -> BridgeResult<RemoteResolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.found {
            Ok(RemoteResolution::new(format!("https://edge/{}", reference)))
        } else {
            Err(BridgeError::NotFound(format!("no stream for {}", reference)))
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    resolver: Resolver,
    preloader: PredictivePreloader,
    fetcher: Arc<CountingFetcher>,
    receiver: Receiver<CoreEvent>,
}

fn harness(remote: Arc<TemplateRemote>) -> Harness {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = EventBus::new(64);
    let receiver = events.subscribe();
    let fetcher = Arc::new(CountingFetcher::default());

    let tiers = TierSet::from_config(
        &CacheConfig::default(),
        Arc::new(MemoryBlobStore::default()),
        clock.clone(),
    );
    let resolver = Resolver::new(
        tiers,
        vec![remote as Arc<dyn RemoteResolver>],
        fetcher.clone(),
        Arc::new(StubUrlFactory::default()),
        events.clone(),
        clock.clone(),
        Duration::from_secs(8),
        Duration::from_secs(30),
    );
    let preloader = PredictivePreloader::new(
        resolver.clone(),
        None,
        events,
        clock,
        PreloadConfig::default()
            .with_jitter_max(0.0)
            .with_stagger(Duration::ZERO),
    );

    Harness {
        resolver,
        preloader,
        fetcher,
        receiver,
    }
}

fn track(reference: &str, artist: &str, genre: &str) -> TrackInfo {
    TrackInfo::new(TrackRef::new(reference))
        .with_artist(artist)
        .with_genre(genre)
}

fn preload_events(receiver: &mut Receiver<CoreEvent>) -> Vec<PreloadEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if let CoreEvent::Preload(preload) = event {
            events.push(preload);
        }
    }
    events
}

async fn drain_background_tasks() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_cycle_warms_likely_candidates_only() {
    let remote = Arc::new(TemplateRemote::serving());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");
    let longshot = track("catalog://longshot", "Slayer", "Metal");

    h.preloader
        .on_active_track_changed(&current, &[next.clone(), longshot.clone()])
        .await;
    drain_background_tasks().await;

    assert!(h.resolver.tiers().warm.get(&next.reference).is_some());
    assert!(h.resolver.tiers().warm.get(&longshot.reference).is_none());
    assert_eq!(h.resolver.tiers().hot.len(), 0);
    assert_eq!(remote.call_count(), 1);
    // Speculative resolutions stop at the URL tier.
    assert_eq!(h.fetcher.call_count(), 0);

    let events = preload_events(&mut h.receiver);
    assert!(events
        .iter()
        .any(|event| matches!(event, PreloadEvent::CycleStarted { candidate_count: 2, .. })));
    let selected: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            PreloadEvent::CandidateSelected { reference, .. } => Some(reference.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(selected, vec!["catalog://next".to_string()]);
    assert!(events
        .iter()
        .any(|event| matches!(event, PreloadEvent::Completed { reference } if reference == "catalog://next")));
}

#[tokio::test]
async fn test_warmed_candidate_resolves_without_network() {
    let remote = Arc::new(TemplateRemote::serving());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");

    h.preloader
        .on_active_track_changed(&current, &[next.clone()])
        .await;
    drain_background_tasks().await;
    assert_eq!(remote.call_count(), 1);

    let stream = h
        .resolver
        .resolve(&next.reference, &next.hints())
        .await
        .unwrap();

    assert_eq!(stream.url, "https://edge/catalog://next");
    assert_eq!(remote.call_count(), 1);

    let mut warm_hits = 0;
    while let Ok(event) = h.receiver.try_recv() {
        if let CoreEvent::Resolve(ResolveEvent::Resolved { tier, .. }) = event {
            if tier == core_runtime::events::CacheTier::Warm {
                warm_hits += 1;
            }
        }
    }
    assert_eq!(warm_hits, 1);
}

#[tokio::test]
async fn test_cancel_pending_supersedes_the_cycle() {
    let remote = Arc::new(TemplateRemote::serving());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");

    // The dispatch task has not run yet when the cancel lands, so the first
    // generation check fails before any network traffic.
    h.preloader
        .on_active_track_changed(&current, &[next.clone()])
        .await;
    h.preloader.cancel_pending();
    drain_background_tasks().await;

    assert_eq!(remote.call_count(), 0);
    assert!(h.resolver.tiers().warm.get(&next.reference).is_none());

    let events = preload_events(&mut h.receiver);
    assert!(events
        .iter()
        .any(|event| matches!(event, PreloadEvent::Superseded { generation: 1 })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, PreloadEvent::Completed { .. })));
}

#[tokio::test]
async fn test_speculative_resolution_skips_cached_references() {
    let remote = Arc::new(TemplateRemote::serving());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");
    h.resolver
        .tiers()
        .warm
        .insert(next.reference.clone(), "https://edge/already".to_string(), None);

    h.preloader
        .on_active_track_changed(&current, &[next.clone()])
        .await;
    drain_background_tasks().await;

    assert_eq!(remote.call_count(), 0);
    assert_eq!(h.resolver.tiers().warm.len(), 1);
    assert!(preload_events(&mut h.receiver)
        .iter()
        .any(|event| matches!(event, PreloadEvent::Completed { .. })));
}

#[tokio::test]
async fn test_speculative_resolution_respects_negative_verdicts() {
    let remote = Arc::new(TemplateRemote::serving());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");
    h.resolver.tiers().negative.insert(next.reference.clone());

    h.preloader
        .on_active_track_changed(&current, &[next.clone()])
        .await;
    drain_background_tasks().await;

    assert_eq!(remote.call_count(), 0);
    assert_eq!(h.resolver.tiers().warm.len(), 0);
}

#[tokio::test]
async fn test_failed_speculation_stays_advisory() {
    let remote = Arc::new(TemplateRemote::not_found());
    let mut h = harness(remote.clone());

    let current = track("catalog://now", "Miles Davis", "Jazz");
    let next = track("catalog://next", "Miles Davis", "Jazz");

    h.preloader
        .on_active_track_changed(&current, &[next.clone()])
        .await;
    drain_background_tasks().await;

    assert_eq!(remote.call_count(), 1);
    assert!(h.resolver.tiers().negative.contains(&next.reference));

    let events = preload_events(&mut h.receiver);
    assert!(events
        .iter()
        .any(|event| matches!(event, PreloadEvent::Failed { reference, .. } if reference == "catalog://next")));
}
