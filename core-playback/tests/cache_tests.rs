//! Cache tier behavior exercised through the public crate surface:
//! capacity bounds, eviction order, TTL expiry and durable cleanup.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::playback::MediaUrlHandle;
use bridge_traits::resolve::TrackRef;
use bridge_traits::storage::{BlobListEntry, BlobMeta, BlobStore, StoredBlob};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use core_playback::cache::{
    CacheConfig, DurableBlobStore, HotUrlCache, L0BlobCache, NegativeResultCache, TierSet,
    WarmUrlCache,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Deterministic clock the tests advance by hand.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = *now + ChronoDuration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// In-memory stand-in for a platform blob store.
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

fn reference(n: usize) -> TrackRef {
    TrackRef::new(format!("catalog://track-{}", n))
}

fn handle(n: usize) -> MediaUrlHandle {
    MediaUrlHandle::new(format!("blob:test-{}", n))
}

#[test]
fn test_l0_holds_exactly_capacity_entries() {
    let clock = Arc::new(ManualClock::new());
    let l0 = L0BlobCache::new(3, clock.clone());
    let now = clock.now();

    for n in 0..3 {
        assert!(l0
            .insert(reference(n), Bytes::from_static(b"pcm"), handle(n), now)
            .is_none());
    }
    assert_eq!(l0.len(), 3);

    let evicted = l0
        .insert(reference(3), Bytes::from_static(b"pcm"), handle(3), now)
        .unwrap();
    assert_eq!(l0.len(), 3);
    assert_eq!(evicted.reference, reference(0));
}

#[test]
fn test_l0_eviction_follows_access_order() {
    let clock = Arc::new(ManualClock::new());
    let l0 = L0BlobCache::new(3, clock.clone());
    let now = clock.now();

    for n in 0..3 {
        l0.insert(reference(n), Bytes::from_static(b"pcm"), handle(n), now);
    }

    // Touching the oldest entry makes the second-oldest the victim.
    assert!(l0.get(&reference(0)).is_some());
    let evicted = l0
        .insert(reference(3), Bytes::from_static(b"pcm"), handle(3), now)
        .unwrap();

    assert_eq!(evicted.reference, reference(1));
    assert!(l0.contains(&reference(0)));
    assert!(l0.contains(&reference(3)));
}

#[test]
fn test_l0_clear_returns_every_handle() {
    let clock = Arc::new(ManualClock::new());
    let l0 = L0BlobCache::new(5, clock.clone());
    let now = clock.now();

    for n in 0..4 {
        l0.insert(reference(n), Bytes::from_static(b"pcm"), handle(n), now);
    }

    let handles = l0.clear();
    assert_eq!(handles.len(), 4);
    assert!(l0.is_empty());
}

#[tokio::test]
async fn test_durable_cleanup_removes_by_age_before_size() {
    let clock = Arc::new(ManualClock::new());
    let durable = DurableBlobStore::new(
        Arc::new(MemoryBlobStore::default()),
        clock.clone(),
        100,
        Duration::from_secs(7 * 24 * 3600),
        0.8,
    );
    let now = clock.now();
    let payload = Bytes::from(vec![0u8; 40]);

    // One entry past the age bound, three fresh ones totalling 120 bytes.
    durable
        .put_if_newer(&reference(0), payload.clone(), now - ChronoDuration::days(8))
        .await
        .unwrap();
    for n in 1..4 {
        durable
            .put_if_newer(
                &reference(n),
                payload.clone(),
                now - ChronoDuration::hours(4 - n as i64),
            )
            .await
            .unwrap();
    }

    let report = durable.cleanup().await.unwrap();

    // The stale entry goes first; the size pass then shrinks 120 bytes to
    // the 80-byte target by dropping the least recently accessed entry.
    assert_eq!(report.removed_by_age, 1);
    assert_eq!(report.removed_by_size, 1);
    assert_eq!(report.remaining_bytes, 80);
    assert!(durable.get(&reference(0)).await.unwrap().is_none());
    assert!(durable.get(&reference(1)).await.unwrap().is_none());
    assert!(durable.get(&reference(3)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_durable_put_if_newer_skips_stale_writes() {
    let clock = Arc::new(ManualClock::new());
    let durable = DurableBlobStore::new(
        Arc::new(MemoryBlobStore::default()),
        clock.clone(),
        1_000,
        Duration::from_secs(7 * 24 * 3600),
        0.8,
    );
    let now = clock.now();

    assert!(durable
        .put_if_newer(&reference(0), Bytes::from_static(b"fresh"), now)
        .await
        .unwrap());

    // A write carrying an older resolution time must not clobber the entry.
    let written = durable
        .put_if_newer(
            &reference(0),
            Bytes::from_static(b"stale"),
            now - ChronoDuration::minutes(5),
        )
        .await
        .unwrap();
    assert!(!written);

    let blob = durable.get(&reference(0)).await.unwrap().unwrap();
    assert_eq!(blob.data, Bytes::from_static(b"fresh"));
}

#[test]
fn test_negative_cache_purges_oldest_at_capacity() {
    let clock = Arc::new(ManualClock::new());
    let negative = NegativeResultCache::new(10, clock.clone());

    for n in 0..10 {
        negative.insert(reference(n));
        clock.advance(Duration::from_secs(1));
    }
    assert_eq!(negative.len(), 10);

    negative.insert(reference(10));

    assert_eq!(negative.len(), 10);
    assert!(!negative.contains(&reference(0)));
    assert!(negative.contains(&reference(1)));
    assert!(negative.contains(&reference(10)));
}

#[test]
fn test_negative_remove_reopens_a_reference() {
    let clock = Arc::new(ManualClock::new());
    let negative = NegativeResultCache::new(10, clock);

    negative.insert(reference(0));
    assert!(negative.contains(&reference(0)));

    assert!(negative.remove(&reference(0)));
    assert!(!negative.contains(&reference(0)));
    assert!(!negative.remove(&reference(0)));
}

#[test]
fn test_warm_entries_expire_after_ttl() {
    let clock = Arc::new(ManualClock::new());
    let warm = WarmUrlCache::new(Duration::from_secs(60), clock.clone());

    warm.insert(reference(0), "https://edge/a".to_string(), None);
    assert!(warm.get(&reference(0)).is_some());

    clock.advance(Duration::from_secs(61));
    assert!(warm.get(&reference(0)).is_none());
}

#[test]
fn test_warm_purge_drops_only_expired_entries() {
    let clock = Arc::new(ManualClock::new());
    let warm = WarmUrlCache::new(Duration::from_secs(60), clock.clone());

    warm.insert(reference(0), "https://edge/a".to_string(), None);
    clock.advance(Duration::from_secs(40));
    warm.insert(reference(1), "https://edge/b".to_string(), None);
    clock.advance(Duration::from_secs(30));

    let purged = warm.purge_expired();
    assert_eq!(purged, 1);
    assert_eq!(warm.len(), 1);
    assert!(warm.get(&reference(1)).is_some());
}

#[test]
fn test_hot_cache_keeps_replayed_entries_at_capacity() {
    let clock = Arc::new(ManualClock::new());
    let hot = HotUrlCache::new(2, Duration::from_secs(300), clock.clone());

    hot.insert(reference(0), "https://edge/a".to_string(), None);
    hot.insert(reference(1), "https://edge/b".to_string(), None);

    // Replays bump the score, so the one-off entry is the victim.
    for _ in 0..3 {
        assert!(hot.get(&reference(0)).is_some());
    }

    hot.insert(reference(2), "https://edge/c".to_string(), None);

    assert_eq!(hot.len(), 2);
    assert!(hot.contains(&reference(0)));
    assert!(!hot.contains(&reference(1)));
    assert!(hot.contains(&reference(2)));
}

#[test]
fn test_hot_entries_honor_expiry_hint() {
    let clock = Arc::new(ManualClock::new());
    let hot = HotUrlCache::new(8, Duration::from_secs(300), clock.clone());
    let hint = clock.now() + ChronoDuration::seconds(30);

    hot.insert(reference(0), "https://edge/a".to_string(), Some(hint));
    assert!(hot.get(&reference(0)).is_some());

    clock.advance(Duration::from_secs(31));
    assert!(hot.get(&reference(0)).is_none());
}

#[tokio::test]
async fn test_snapshot_aggregates_every_tier() {
    let clock = Arc::new(ManualClock::new());
    let tiers = TierSet::from_config(
        &CacheConfig::default(),
        Arc::new(MemoryBlobStore::default()),
        clock.clone(),
    );
    let now = clock.now();

    tiers
        .l0
        .insert(reference(0), Bytes::from_static(b"pcm"), handle(0), now);
    tiers.hot.insert(reference(1), "https://edge/b".to_string(), None);
    tiers.warm.insert(reference(2), "https://edge/c".to_string(), None);
    tiers.negative.insert(reference(3));
    tiers
        .durable
        .put_if_newer(&reference(4), Bytes::from_static(b"stored"), now)
        .await
        .unwrap();

    let snapshot = tiers.snapshot(clock.as_ref()).await.unwrap();

    assert_eq!(snapshot.l0.entries, 1);
    assert_eq!(snapshot.hot.entries, 1);
    assert_eq!(snapshot.warm.entries, 1);
    assert_eq!(snapshot.negative.entries, 1);
    assert_eq!(snapshot.durable.entries, 1);
    assert_eq!(snapshot.total_entries(), 5);
    assert!(snapshot.total_bytes() >= 9);
}
