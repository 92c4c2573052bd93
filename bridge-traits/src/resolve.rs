//! Remote Resolution Abstraction
//!
//! A [`TrackRef`] is an opaque, stable identifier for a track's audio source.
//! The core turns it into a playable URL by consulting its cache tiers and,
//! on a miss, dispatching to the [`RemoteResolver`] registered for the
//! reference's source kind. One resolver implementation exists per kind
//! (local object storage, third-party drive, external catalog).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Opaque logical reference to a track's audio source.
///
/// Stable for the lifetime of a track entity and used as the cache key across
/// every tier. The scheme prefix selects the source kind, e.g.
/// `file://music/a.flac`, `drive://1a2b3c`, `catalog://isrc/USX91402530`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Source kind derived from the scheme prefix, if recognized.
    pub fn source_kind(&self) -> Option<SourceKind> {
        let scheme = self.0.split_once("://").map(|(s, _)| s)?;
        match scheme {
            "file" => Some(SourceKind::LocalStorage),
            "drive" => Some(SourceKind::RemoteDrive),
            "catalog" => Some(SourceKind::Catalog),
            _ => None,
        }
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Kind of backing source a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Object storage owned by the deployment; URLs come from a signer.
    LocalStorage,
    /// Third-party drive provider reached through its API.
    RemoteDrive,
    /// External catalog lookup by track id.
    Catalog,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::LocalStorage => "local-storage",
            SourceKind::RemoteDrive => "remote-drive",
            SourceKind::Catalog => "catalog",
        };
        f.write_str(name)
    }
}

/// Optional human-readable hints passed through to resolvers that need them
/// (catalog lookup quality improves with title/artist).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveHints {
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl ResolveHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}

/// Fresh resolution produced by a [`RemoteResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResolution {
    /// Playable URL for the track.
    pub url: String,
    /// When the provider expects the URL to stop working, if reported.
    pub expires_hint: Option<DateTime<Utc>>,
    /// Track duration in seconds, if reported.
    pub duration: Option<f64>,
}

impl RemoteResolution {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_hint: None,
            duration: None,
        }
    }

    pub fn with_expires_hint(mut self, expires: DateTime<Utc>) -> Self {
        self.expires_hint = Some(expires);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Descriptive track record used by the preloader and recommendation seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub reference: TrackRef,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// Duration in seconds, when known.
    pub duration: Option<f64>,
}

impl TrackInfo {
    pub fn new(reference: TrackRef) -> Self {
        Self {
            reference,
            title: None,
            artist: None,
            genre: None,
            duration: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Hints derived from this record for resolver dispatch.
    pub fn hints(&self) -> ResolveHints {
        ResolveHints {
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Trait for source-kind-specific URL resolution.
///
/// Implementations should:
/// - Return [`BridgeError::NotFound`](crate::error::BridgeError) only on a
///   definitive not-found verdict from the backing service
/// - Return `Network`/`Io` errors for transport problems so the core can
///   treat them as retryable
/// - Not apply their own long timeouts; the core enforces a hard deadline
#[async_trait]
pub trait RemoteResolver: Send + Sync {
    /// The source kind this resolver serves.
    fn kind(&self) -> SourceKind;

    /// Resolve a fresh playable URL for the reference.
    async fn resolve_remote(
        &self,
        reference: &TrackRef,
        hints: &ResolveHints,
    ) -> Result<RemoteResolution>;
}
