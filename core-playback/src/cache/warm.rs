//! Warm URL cache
//!
//! Holds speculatively resolved URLs from predictive preloading. Entries are
//! only trusted for a short TTL; a skipped prediction simply ages out. No
//! size cap is enforced beyond what one predictive cycle produces.

use bridge_traits::resolve::TrackRef;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::hot::UrlHit;
use crate::cache::stats::TierStats;

struct WarmEntry {
    url: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Short-TTL cache of speculatively resolved URLs.
pub struct WarmUrlCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<TrackRef, WarmEntry>>,
}

impl WarmUrlCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a speculative URL. The provider's expiry hint wins when it is
    /// sooner than the configured TTL.
    pub fn insert(&self, reference: TrackRef, url: String, expires_hint: Option<DateTime<Utc>>) {
        let now = self.clock.now();
        let ttl_expiry =
            now + ChronoDuration::from_std(self.ttl).unwrap_or(ChronoDuration::zero());
        let expires_at = match expires_hint {
            Some(hint) if hint < ttl_expiry => hint,
            _ => ttl_expiry,
        };

        self.entries.lock().insert(
            reference,
            WarmEntry {
                url,
                created_at: now,
                expires_at,
            },
        );
    }

    /// Look up an unexpired URL; expired entries are removed on read.
    pub fn get(&self, reference: &TrackRef) -> Option<UrlHit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get(reference) {
            Some(entry) if entry.expires_at > now => Some(UrlHit {
                url: entry.url.clone(),
                created_at: entry.created_at,
            }),
            Some(_) => {
                entries.remove(reference);
                None
            }
            None => None,
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn remove(&self, reference: &TrackRef) -> bool {
        self.entries.lock().remove(reference).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> TierStats {
        let entries = self.entries.lock();
        let now = self.clock.now();
        let oldest = entries
            .values()
            .map(|e| e.created_at)
            .min()
            .map(|created_at| (now - created_at).num_seconds());

        TierStats {
            entries: entries.len(),
            total_bytes: 0,
            oldest_entry_age_seconds: oldest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::ManualClock;

    fn cache_with_clock(ttl: Duration) -> (WarmUrlCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = WarmUrlCache::new(ttl, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_insert_and_get_within_ttl() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        let reference = TrackRef::new("catalog://next");

        cache.insert(reference.clone(), "https://u/next".into(), None);

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&reference).unwrap().url, "https://u/next");
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        let reference = TrackRef::new("catalog://next");

        cache.insert(reference.clone(), "https://u/next".into(), None);

        clock.advance(Duration::from_secs(61));
        assert!(cache.get(&reference).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sooner_expiry_hint_wins() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        let reference = TrackRef::new("catalog://next");

        let hint = clock.now() + ChronoDuration::seconds(10);
        cache.insert(reference.clone(), "https://u/next".into(), Some(hint));

        clock.advance(Duration::from_secs(11));
        assert!(cache.get(&reference).is_none());
    }

    #[test]
    fn test_later_expiry_hint_capped_by_ttl() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));
        let reference = TrackRef::new("catalog://next");

        let hint = clock.now() + ChronoDuration::seconds(3600);
        cache.insert(reference.clone(), "https://u/next".into(), Some(hint));

        clock.advance(Duration::from_secs(61));
        assert!(cache.get(&reference).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(60));

        cache.insert(TrackRef::new("catalog://a"), "https://u/a".into(), None);
        clock.advance(Duration::from_secs(30));
        cache.insert(TrackRef::new("catalog://b"), "https://u/b".into(), None);

        clock.advance(Duration::from_secs(31));
        let purged = cache.purge_expired();

        assert_eq!(purged, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&TrackRef::new("catalog://b")).is_some());
    }
}
