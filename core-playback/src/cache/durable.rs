//! Durable blob tier
//!
//! Wraps the platform [`BlobStore`] with the accounting the cache hierarchy
//! needs: access-time touches on read, stale-write protection on backfill,
//! and a two-phase cleanup pass (age cap first, then size cap). This is the
//! only tier that survives process restarts.

use bridge_traits::resolve::TrackRef;
use bridge_traits::storage::{BlobMeta, BlobStore, StoredBlob};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::stats::{CleanupReport, TierStats};
use crate::error::Result;

/// Persistent byte tier with age and size enforcement.
pub struct DurableBlobStore {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    max_bytes: u64,
    max_age: Duration,
    cleanup_target: f64,
}

impl DurableBlobStore {
    pub fn new(
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        max_bytes: u64,
        max_age: Duration,
        cleanup_target: f64,
    ) -> Self {
        Self {
            store,
            clock,
            max_bytes,
            max_age,
            cleanup_target,
        }
    }

    /// Fetch a blob, touching its access time.
    ///
    /// The touch is best-effort; a failed metadata rewrite still serves the
    /// payload.
    pub async fn get(&self, reference: &TrackRef) -> Result<Option<StoredBlob>> {
        let Some(mut blob) = self.store.get(reference).await? else {
            return Ok(None);
        };

        blob.meta.last_accessed_at = self.clock.now();
        if let Err(error) = self.store.update_meta(reference, blob.meta.clone()).await {
            warn!(reference = %reference, %error, "Failed to touch durable entry access time");
        }

        Ok(Some(blob))
    }

    /// Write a blob unless a newer or equal-aged entry already exists.
    ///
    /// Backfill tasks race with foreground resolution; comparing creation
    /// times keeps a slow fetch from clobbering fresher bytes. Returns true
    /// when the write happened.
    pub async fn put_if_newer(
        &self,
        reference: &TrackRef,
        data: Bytes,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        if let Some(existing) = self.store.get(reference).await? {
            if existing.meta.created_at >= created_at {
                debug!(
                    reference = %reference,
                    "Skipped durable write: existing entry is newer"
                );
                return Ok(false);
            }
        }

        let meta = BlobMeta::new(created_at, data.len() as u64);
        self.store.put(reference, data, meta).await?;
        Ok(true)
    }

    /// Creation time of a stored entry without fetching the payload's touch.
    pub async fn created_at(&self, reference: &TrackRef) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .get(reference)
            .await?
            .map(|blob| blob.meta.created_at))
    }

    /// Delete a single entry. Returns true if it existed.
    pub async fn remove(&self, reference: &TrackRef) -> Result<bool> {
        let existed = self.store.get(reference).await?.is_some();
        if existed {
            self.store.delete(reference).await?;
        }
        Ok(existed)
    }

    /// Two-phase cleanup: drop entries past the age cap, then shrink to the
    /// cleanup target when the tier is over its size cap.
    ///
    /// Size-based removal walks least-recently-accessed entries first, so a
    /// track replayed yesterday outlives one downloaded a week ago and never
    /// touched since.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        let now = self.clock.now();
        let age_cutoff =
            now - ChronoDuration::from_std(self.max_age).unwrap_or(ChronoDuration::zero());

        let mut entries = self.store.list_all().await?;
        let mut report = CleanupReport::default();

        // Phase 1: age cap.
        let mut survivors = Vec::with_capacity(entries.len());
        for entry in entries.drain(..) {
            if entry.meta.created_at < age_cutoff {
                self.store.delete(&entry.key).await?;
                report.removed_by_age += 1;
            } else {
                survivors.push(entry);
            }
        }

        // Phase 2: size cap, shrinking down to the target fraction.
        let mut total_bytes: u64 = survivors.iter().map(|e| e.meta.size).sum();
        if total_bytes > self.max_bytes {
            let target_bytes = (self.max_bytes as f64 * self.cleanup_target) as u64;
            survivors.sort_by_key(|e| e.meta.last_accessed_at);

            for entry in &survivors {
                if total_bytes <= target_bytes {
                    break;
                }
                self.store.delete(&entry.key).await?;
                total_bytes -= entry.meta.size;
                report.removed_by_size += 1;
            }
        }

        report.remaining_bytes = total_bytes;

        if report.total_removed() > 0 {
            debug!(
                removed_by_age = report.removed_by_age,
                removed_by_size = report.removed_by_size,
                remaining_bytes = report.remaining_bytes,
                "Durable cleanup completed"
            );
        }

        Ok(report)
    }

    /// Delete every entry whose key is not in `keep`.
    ///
    /// Backs current-song retention, where only the active and previous
    /// track stay on disk. Returns the number of entries removed.
    pub async fn retain_only(&self, keep: &[TrackRef]) -> Result<usize> {
        let entries = self.store.list_all().await?;
        let mut removed = 0;

        for entry in entries {
            if !keep.contains(&entry.key) {
                self.store.delete(&entry.key).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, kept = keep.len(), "Durable tier trimmed to retained set");
        }

        Ok(removed)
    }

    /// Delete every entry. Returns the number removed.
    pub async fn clear(&self) -> Result<usize> {
        let entries = self.store.list_all().await?;
        let removed = entries.len();

        for entry in entries {
            self.store.delete(&entry.key).await?;
        }

        Ok(removed)
    }

    pub async fn stats(&self) -> Result<TierStats> {
        let entries = self.store.list_all().await?;
        let now = self.clock.now();

        let total_bytes = entries.iter().map(|e| e.meta.size).sum();
        let oldest = entries
            .iter()
            .map(|e| e.meta.created_at)
            .min()
            .map(|created_at| (now - created_at).num_seconds());

        Ok(TierStats {
            entries: entries.len(),
            total_bytes,
            oldest_entry_age_seconds: oldest,
        })
    }
}
