//! Workspace facade crate.
//!
//! Re-exports the playback core and the logging runtime so host applications
//! can depend on a single crate. The `desktop-shims` feature (default) also
//! pulls in the desktop bridge implementations.

pub use core_playback as playback;
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
