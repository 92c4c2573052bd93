//! Hot URL cache
//!
//! Keeps recently used resolved URLs alive under a frequency/recency score.
//! At capacity the lowest-scoring entry is evicted, so a track replayed many
//! times survives a burst of one-off resolutions. Entries expire at the
//! provider's hint, or after a configured fallback TTL.

use bridge_traits::resolve::TrackRef;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::cache::stats::TierStats;

struct HotEntry {
    url: String,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    access_count: u64,
    expires_at: DateTime<Utc>,
}

impl HotEntry {
    /// Recency-weighted access frequency; lowest score is evicted first.
    fn score(&self, now: DateTime<Utc>) -> f64 {
        let idle_seconds = (now - self.last_accessed_at).num_seconds().max(0) as f64;
        self.access_count as f64 / (1.0 + idle_seconds)
    }
}

/// Successful URL-tier lookup.
#[derive(Debug, Clone)]
pub struct UrlHit {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Bounded, scored URL cache.
pub struct HotUrlCache {
    clock: Arc<dyn Clock>,
    capacity: usize,
    default_ttl: Duration,
    entries: Mutex<HashMap<TrackRef, HotEntry>>,
}

impl HotUrlCache {
    pub fn new(capacity: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity,
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a resolved URL, evicting the lowest-scoring entry at capacity.
    pub fn insert(&self, reference: TrackRef, url: String, expires_hint: Option<DateTime<Utc>>) {
        let now = self.clock.now();
        let expires_at = expires_hint.unwrap_or_else(|| {
            now + ChronoDuration::from_std(self.default_ttl).unwrap_or(ChronoDuration::zero())
        });

        let mut entries = self.entries.lock();

        if !entries.contains_key(&reference) && entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by(|(_, a), (_, b)| {
                    a.score(now)
                        .partial_cmp(&b.score(now))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(key, _)| key.clone());

            if let Some(victim) = victim {
                trace!(reference = %victim, "Hot cache evicted lowest-scoring entry");
                entries.remove(&victim);
            }
        }

        entries.insert(
            reference,
            HotEntry {
                url,
                created_at: now,
                last_accessed_at: now,
                // The resolution that produced the URL counts as one access.
                access_count: 1,
                expires_at,
            },
        );
    }

    /// Look up an unexpired URL, bumping its access statistics.
    ///
    /// Expired entries are removed and reported as absent.
    pub fn get(&self, reference: &TrackRef) -> Option<UrlHit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.get_mut(reference) {
            Some(entry) if entry.expires_at > now => {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                Some(UrlHit {
                    url: entry.url.clone(),
                    created_at: entry.created_at,
                })
            }
            Some(_) => {
                entries.remove(reference);
                None
            }
            None => None,
        }
    }

    /// Check for an unexpired entry without bumping its access statistics.
    pub fn contains(&self, reference: &TrackRef) -> bool {
        let now = self.clock.now();
        self.entries
            .lock()
            .get(reference)
            .map(|entry| entry.expires_at > now)
            .unwrap_or(false)
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
