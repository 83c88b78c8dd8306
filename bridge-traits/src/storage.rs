//! Storage Location Abstraction
//!
//! The platform context the core needs to place its on-disk cache. Hosts
//! report an app-scoped external directory (may be unavailable, e.g. when
//! removable storage is unmounted) and an internal directory that always
//! exists.

use std::path::PathBuf;

/// Platform storage context
///
/// - Android: `getExternalFilesDir(null)` / `getFilesDir()`
/// - Desktop: user data directory / home-based fallback
/// - Tests: explicit temporary directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageContext;
///
/// fn cache_root(ctx: &dyn StorageContext) -> PathBuf {
///     ctx.external_files_dir().unwrap_or_else(|| ctx.files_dir())
/// }
/// ```
pub trait StorageContext: Send + Sync {
    /// Application-scoped external storage directory, if currently available.
    fn external_files_dir(&self) -> Option<PathBuf>;

    /// Internal application directory. Always available.
    fn files_dir(&self) -> PathBuf;
}
