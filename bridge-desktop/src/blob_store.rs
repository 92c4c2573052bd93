//! Durable Blob Storage on the File System

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    resolve::TrackRef,
    storage::{BlobListEntry, BlobMeta, BlobStore, StoredBlob},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Sidecar record persisted next to each payload file.
///
/// Carries the original key because the payload file name is a digest and
/// cannot be reversed during [`BlobStore::list_all`].
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: TrackRef,
    meta: BlobMeta,
}

/// File-system blob store backing the durable cache tier.
///
/// Each entry becomes two files under the root directory:
/// - `<digest>.bin` holding the payload bytes
/// - `<digest>.meta.json` holding the key and accounting metadata
///
/// where `<digest>` is the hex SHA-256 of the key. Hashing keeps arbitrary
/// reference strings (schemes, slashes, unicode) out of file names.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store under the platform cache directory.
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cadence-playback")
            .join("blobs");
        Self { root }
    }

    /// Create a store rooted at a custom directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn file_stem(key: &TrackRef) -> String {
        let digest = Sha256::digest(key.as_str().as_bytes());
        let mut stem = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(stem, "{:02x}", byte);
        }
        stem
    }

    fn payload_path(&self, key: &TrackRef) -> PathBuf {
        self.root.join(format!("{}.bin", Self::file_stem(key)))
    }

    fn sidecar_path(&self, key: &TrackRef) -> PathBuf {
        self.root.join(format!("{}.meta.json", Self::file_stem(key)))
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .await
                .map_err(Self::map_io_error)?;
            debug!(path = ?self.root, "Created blob store directory");
        }
        Ok(())
    }

    async fn read_sidecar(&self, path: &Path) -> Result<Option<Sidecar>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::map_io_error(e)),
        };

        let sidecar = serde_json::from_slice(&raw).map_err(|e| {
            BridgeError::OperationFailed(format!("corrupt blob sidecar {:?}: {}", path, e))
        })?;
        Ok(Some(sidecar))
    }

    async fn write_sidecar(&self, path: &Path, sidecar: &Sidecar) -> Result<()> {
        let raw = serde_json::to_vec(sidecar).map_err(|e| {
            BridgeError::OperationFailed(format!("failed to encode blob sidecar: {}", e))
        })?;
        fs::write(path, raw).await.map_err(Self::map_io_error)
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }
}

impl Default for FsBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &TrackRef) -> Result<Option<StoredBlob>> {
        let Some(sidecar) = self.read_sidecar(&self.sidecar_path(key)).await? else {
            return Ok(None);
        };

        let data = match fs::read(self.payload_path(key)).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Orphaned sidecar, most likely a crash between the two
                // writes. Treat as absent and let the next put repair it.
                warn!(key = %key, "Blob payload missing for existing sidecar");
                return Ok(None);
            }
            Err(e) => return Err(Self::map_io_error(e)),
        };

        debug!(key = %key, size = data.len(), "Read blob");
        Ok(Some(StoredBlob {
            data,
            meta: sidecar.meta,
        }))
    }

    async fn put(&self, key: &TrackRef, data: Bytes, meta: BlobMeta) -> Result<()> {
        self.ensure_root().await?;

        // Payload first, sidecar second. A crash in between leaves an
        // unlisted payload file rather than a record pointing at nothing.
        fs::write(self.payload_path(key), data.as_ref())
            .await
            .map_err(Self::map_io_error)?;

        let sidecar = Sidecar {
            key: key.clone(),
            meta,
        };
        self.write_sidecar(&self.sidecar_path(key), &sidecar).await?;

        debug!(key = %key, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn update_meta(&self, key: &TrackRef, meta: BlobMeta) -> Result<()> {
        let path = self.sidecar_path(key);
        let Some(mut sidecar) = self.read_sidecar(&path).await? else {
            return Ok(());
        };

        sidecar.meta = meta;
        self.write_sidecar(&path, &sidecar).await?;
        debug!(key = %key, "Updated blob metadata");
        Ok(())
    }

    async fn delete(&self, key: &TrackRef) -> Result<()> {
        Self::remove_if_present(&self.sidecar_path(key)).await?;
        Self::remove_if_present(&self.payload_path(key)).await?;
        debug!(key = %key, "Deleted blob");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<BlobListEntry>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&self.root).await.map_err(Self::map_io_error)?;

        while let Some(entry) = read_dir.next_entry().await.map_err(Self::map_io_error)? {
            let path = entry.path();
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(".meta.json") {
                continue;
            }

            match self.read_sidecar(&path).await {
                Ok(Some(sidecar)) => entries.push(BlobListEntry {
                    key: sidecar.key,
                    meta: sidecar.meta,
                }),
                Ok(None) => {}
                Err(e) => {
                    // One unreadable record must not take down cleanup for
                    // the whole tier.
                    warn!(path = ?path, error = %e, "Skipping unreadable blob sidecar");
                }
            }
        }

        debug!(count = entries.len(), "Listed blobs");
        Ok(entries)
    }
}
