//! Persistent Storage Abstractions
//!
//! Provides platform-agnostic traits for the durable blob tier's backing
//! store and for key-value settings persistence.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resolve::TrackRef;

/// Accounting metadata stored alongside each blob.
///
/// The durable tier owns this record; the store persists it opaquely and
/// returns it verbatim from [`BlobStore::list_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMeta {
    /// When the blob was written.
    pub created_at: DateTime<Utc>,
    /// When the blob was last served to a caller.
    pub last_accessed_at: DateTime<Utc>,
    /// Payload size in bytes.
    pub size: u64,
}

impl BlobMeta {
    pub fn new(created_at: DateTime<Utc>, size: u64) -> Self {
        Self {
            created_at,
            last_accessed_at: created_at,
            size,
        }
    }
}

/// A stored blob returned from [`BlobStore::get`].
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub data: Bytes,
    pub meta: BlobMeta,
}

/// Key plus metadata, without the payload. Used for cleanup accounting.
#[derive(Debug, Clone)]
pub struct BlobListEntry {
    pub key: TrackRef,
    pub meta: BlobMeta,
}

/// Persistent key/value byte store trait
///
/// Backs the durable cache tier. Implementations map keys to payloads on
/// whatever persistence the platform offers:
/// - Desktop: files under the application data directory
/// - Mobile: sandboxed app storage
///
/// Keys are logical track references; the store must treat them as opaque.
/// Survives process restarts; this is the only authoritative cache tier.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{BlobStore, BlobMeta};
///
/// async fn usage(store: &dyn BlobStore) -> Result<u64> {
///     let entries = store.list_all().await?;
///     Ok(entries.iter().map(|e| e.meta.size).sum())
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch a blob and its metadata. Returns `Ok(None)` when absent.
    async fn get(&self, key: &TrackRef) -> Result<Option<StoredBlob>>;

    /// Write a blob with its metadata, replacing any previous entry.
    async fn put(&self, key: &TrackRef, data: Bytes, meta: BlobMeta) -> Result<()>;

    /// Rewrite only the metadata of an existing entry (access-time touch).
    ///
    /// A no-op when the key is absent.
    async fn update_meta(&self, key: &TrackRef, meta: BlobMeta) -> Result<()>;

    /// Delete an entry. Deleting an absent key is not an error.
    async fn delete(&self, key: &TrackRef) -> Result<()>;

    /// List every stored entry's key and metadata, without payloads.
    async fn list_all(&self) -> Result<Vec<BlobListEntry>>;
}

/// Small key/value persistence for best-effort state.
///
/// The core parks things like the prediction context here. Values lost
/// from this store only cost warm-up accuracy after a restart, never
/// correctness, so implementations are free to trade durability for
/// simplicity.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value.
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value under `key`, `Ok(None)` when unset.
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Every currently set key.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Drop every stored value.
    async fn clear_all(&self) -> Result<()>;
}
