//! Media URL Materialization via Temp Files

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{MediaUrlFactory, MediaUrlHandle},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Temp-file based media URL factory
///
/// Desktop audio engines accept `file://` URLs directly, so materializing a
/// byte buffer is a write to a uniquely named file under a scratch
/// directory. `release` removes the file again; the instant cache tier calls
/// it whenever it evicts an entry.
pub struct TempFileUrlFactory {
    dir: PathBuf,
}

impl TempFileUrlFactory {
    /// Create a factory writing under the platform cache directory.
    pub fn new() -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cadence-playback")
            .join("media");
        Self { dir }
    }

    /// Create a factory writing under a custom directory.
    pub fn with_directory(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    fn path_from_url(url: &str) -> Result<PathBuf> {
        let path = url.strip_prefix("file://").ok_or_else(|| {
            BridgeError::OperationFailed(format!("not a file URL: {}", url))
        })?;
        Ok(PathBuf::from(path))
    }
}

impl Default for TempFileUrlFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaUrlFactory for TempFileUrlFactory {
    async fn materialize(&self, data: Bytes) -> Result<MediaUrlHandle> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(Self::map_io_error)?;
            debug!(path = ?self.dir, "Created media scratch directory");
        }

        let path = self.dir.join(format!("{}.bin", Uuid::new_v4()));
        fs::write(&path, data.as_ref())
            .await
            .map_err(Self::map_io_error)?;

        debug!(path = ?path, size = data.len(), "Materialized media file");
        Ok(MediaUrlHandle::new(format!("file://{}", path.display())))
    }

    async fn release(&self, handle: MediaUrlHandle) -> Result<()> {
        let path = Self::path_from_url(handle.url())?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "Released media file");
                Ok(())
            }
            // Already gone counts as released.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }
}
