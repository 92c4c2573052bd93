//! Negative result cache
//!
//! Remembers definitive not-found verdicts so repeated resolution of a
//! missing reference fails fast without touching the network. Timeouts and
//! transport failures must never be recorded here; a transient outage would
//! otherwise poison the reference until manual removal.

use bridge_traits::resolve::TrackRef;
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::stats::TierStats;

/// Bounded set of references known to be unavailable.
pub struct NegativeResultCache {
    clock: Arc<dyn Clock>,
    capacity: usize,
    entries: Mutex<HashMap<TrackRef, DateTime<Utc>>>,
}

impl NegativeResultCache {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Record a definitive not-found verdict for `reference`.
    ///
    /// At capacity, the oldest ~10% of entries (by insertion time) are purged
    /// to make room.
    pub fn insert(&self, reference: TrackRef) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if !entries.contains_key(&reference) && entries.len() >= self.capacity {
            let purge_count = (self.capacity / 10).max(1);
            let mut by_age: Vec<(TrackRef, DateTime<Utc>)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

            for (key, _) in by_age.into_iter().take(purge_count) {
                entries.remove(&key);
            }

            debug!(purged = purge_count, "Negative cache purged oldest entries");
        }

        entries.insert(reference, now);
    }

    /// Returns true if `reference` is currently marked unavailable.
    pub fn contains(&self, reference: &TrackRef) -> bool {
        self.entries.lock().contains_key(reference)
    }

    /// Remove a negative mark, re-enabling network resolution.
    pub fn remove(&self, reference: &TrackRef) -> bool {
        self.entries.lock().remove(reference).is_some()
    }

    /// Drop every negative mark.
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
            .min()
            .map(|inserted_at| (now - *inserted_at).num_seconds());

        TierStats {
            entries: entries.len(),
            total_bytes: 0,
            oldest_entry_age_seconds: oldest,
        }
    }
}
