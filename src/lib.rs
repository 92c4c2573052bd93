//! Workspace placeholder crate.
//!
//! This crate exists so host applications can depend on `cadence-workspace`
//! and pull in the playback core together with the desktop bridge
//! implementations, without wiring each workspace crate individually.

pub use bridge_desktop;
pub use bridge_traits;
pub use core_playback;
pub use core_runtime;
