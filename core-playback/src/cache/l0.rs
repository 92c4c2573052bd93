//! Instant playback tier
//!
//! Smallest and fastest tier: a strict LRU of fully materialized entries,
//! each owning the audio bytes and a playable URL handle. Lookups are
//! synchronous. Evicted handles are returned to the caller, which must
//! release them through `MediaUrlFactory::release`; the tier itself never
//! performs I/O.

use bridge_traits::playback::MediaUrlHandle;
use bridge_traits::resolve::TrackRef;
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::cache::stats::TierStats;

/// A fully materialized cache entry.
struct L0Entry {
    bytes: Bytes,
    handle: MediaUrlHandle,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

/// Successful L0 lookup.
#[derive(Debug, Clone)]
pub struct L0Hit {
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Entry displaced by an insert; the caller owns releasing the handle.
#[derive(Debug)]
pub struct EvictedEntry {
    pub reference: TrackRef,
    pub handle: MediaUrlHandle,
}

/// Strict-LRU in-memory tier of materialized entries.
pub struct L0BlobCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<TrackRef, L0Entry>>,
}

impl L0BlobCache {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Insert a materialized entry, returning whatever it displaced.
    ///
    /// The displaced entry is either the previous value under the same key or
    /// the least recently used entry at capacity. Its URL handle must be
    /// released by the caller.
    pub fn insert(
        &self,
        reference: TrackRef,
        bytes: Bytes,
        handle: MediaUrlHandle,
        created_at: DateTime<Utc>,
    ) -> Option<EvictedEntry> {
        let now = self.clock.now();
        let entry = L0Entry {
            bytes,
            handle,
            created_at,
            last_accessed_at: now,
        };

        self.entries
            .lock()
            .push(reference, entry)
            .map(|(reference, old)| EvictedEntry {
                reference,
                handle: old.handle,
            })
    }

    /// Look up an entry, marking it most recently used.
    pub fn get(&self, reference: &TrackRef) -> Option<L0Hit> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(reference)?;
        entry.last_accessed_at = now;

        Some(L0Hit {
            url: entry.handle.url().to_string(),
            created_at: entry.created_at,
        })
    }

    /// Peek an entry's creation time without disturbing LRU order.
    pub fn created_at(&self, reference: &TrackRef) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .peek(reference)
            .map(|entry| entry.created_at)
    }

    pub fn contains(&self, reference: &TrackRef) -> bool {
        self.entries.lock().contains(reference)
    }

    /// Remove a single entry, returning its handle for release.
    pub fn remove(&self, reference: &TrackRef) -> Option<MediaUrlHandle> {
        self.entries.lock().pop(reference).map(|entry| entry.handle)
    }

    /// Drop every entry, returning all handles for release.
    pub fn clear(&self) -> Vec<MediaUrlHandle> {
        let mut entries = self.entries.lock();
        let mut handles = Vec::with_capacity(entries.len());
        while let Some((_, entry)) = entries.pop_lru() {
            handles.push(entry.handle);
        }
        handles
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
        let total_bytes = entries.iter().map(|(_, e)| e.bytes.len() as u64).sum();
        let oldest = entries
            .iter()
            .map(|(_, e)| e.created_at)
            .min()
            .map(|created_at| (now - created_at).num_seconds());

        TierStats {
            entries: entries.len(),
            total_bytes,
            oldest_entry_age_seconds: oldest,
        }
    }
}
