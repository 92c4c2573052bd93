//! # Playback Error Types
//!
//! Comprehensive error types for resolution, caching, and crossfade
//! operations.

use thiserror::Error;

/// Errors that can occur during playback core operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The reference was previously marked unavailable by a definitive
    /// not-found verdict; no network attempt was made.
    #[error("Track known unavailable: {0}")]
    KnownUnavailable(String),

    /// Network resolution exceeded the configured hard deadline.
    #[error("Resolution timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport-level failure while resolving or fetching.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Remote responded, but without a usable stream URL.
    #[error("Invalid resolver response: {0}")]
    InvalidResponse(String),

    /// No remote resolver is registered for the reference's source kind.
    #[error("No resolver registered for source kind: {0}")]
    UnknownSource(String),

    // ========================================================================
    // Crossfade Errors
    // ========================================================================
    /// A crossfade attempt was abandoned before the swap point.
    ///
    /// Non-fatal: the outgoing engine keeps playing unfaded.
    #[error("Crossfade aborted: {0}")]
    CrossfadeAborted(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Durable cache operation failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Engine configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge capability was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Error surfaced from a bridge implementation.
    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be
    /// retried later.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Timeout(_) | PlaybackError::NetworkFailure(_) => true,
            PlaybackError::Bridge(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns `true` if the reference is known-missing and retrying is
    /// pointless until the negative mark is removed.
    pub fn is_known_unavailable(&self) -> bool {
        matches!(self, PlaybackError::KnownUnavailable(_))
    }

    /// Returns `true` if this error left the active audio untouched.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, PlaybackError::CrossfadeAborted(_))
    }
}

/// Result type for playback core operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
