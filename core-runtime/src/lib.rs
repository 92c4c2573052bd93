//! Runtime foundation shared by every crate in the workspace.
//!
//! Hosts the pieces that are the same no matter which feature area is
//! running: the tracing pipeline with its sink mirror and field
//! redaction, the broadcast event bus the playback engine publishes on,
//! and the error type those facilities report through.
//!
//! Nothing in here knows about tracks, caches or players. Keeping this
//! crate domain-free lets the bridge crates depend on it without
//! dragging the playback graph along.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
