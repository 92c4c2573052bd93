//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Statistics for a single cache tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of live entries in the tier
    pub entries: usize,

    /// Total bytes held by the tier (0 for URL-only tiers)
    pub total_bytes: u64,

    /// Age of the oldest entry in seconds, if any entry exists
    pub oldest_entry_age_seconds: Option<i64>,
}

impl TierStats {
    /// Calculate tier usage as a percentage of a byte cap.
    pub fn usage_percentage(&self, max_bytes: u64) -> f64 {
        if max_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / max_bytes as f64) * 100.0
    }

    /// Returns true if the tier is near a byte cap (>90%).
    pub fn is_near_capacity(&self, max_bytes: u64) -> bool {
        self.usage_percentage(max_bytes) > 90.0
    }

    /// Returns true if the tier meets or exceeds a byte cap.
    pub fn is_full(&self, max_bytes: u64) -> bool {
        self.total_bytes >= max_bytes
    }

    /// Bytes that would have to be freed to get under a byte cap.
    pub fn space_needed(&self, max_bytes: u64) -> u64 {
        if self.total_bytes <= max_bytes {
            0
        } else {
            self.total_bytes - max_bytes
        }
    }

    /// Returns average bytes per entry.
    pub fn average_entry_size(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries as u64
        }
    }
}

/// Point-in-time snapshot of every cache tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Instant in-memory tier (bytes + materialized URLs)
    pub l0: TierStats,

    /// Scored URL cache
    pub hot: TierStats,

    /// Speculative short-TTL URL cache
    pub warm: TierStats,

    /// Remembered not-found verdicts
    pub negative: TierStats,

    /// Persistent byte store
    pub durable: TierStats,

    /// Timestamp when the snapshot was taken
    pub calculated_at: i64,
}

impl CacheSnapshot {
    /// Total live entries across every tier.
    pub fn total_entries(&self) -> usize {
        self.l0.entries
            + self.hot.entries
            + self.warm.entries
            + self.negative.entries
            + self.durable.entries
    }

    /// Total bytes held across byte-owning tiers.
    pub fn total_bytes(&self) -> u64 {
        self.l0.total_bytes + self.durable.total_bytes
    }
}

/// Outcome of a durable cleanup pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Entries removed because they exceeded the age cap
    pub removed_by_age: usize,

    /// Entries removed to get under the size cap
    pub removed_by_size: usize,

    /// Total bytes remaining after cleanup
    pub remaining_bytes: u64,
}

impl CleanupReport {
    /// Returns total entries removed by the pass.
    pub fn total_removed(&self) -> usize {
        self.removed_by_age + self.removed_by_size
    }
}
