//! Cache root selection
//!
//! The cache lives under the app-scoped external directory when the host has
//! one mounted, otherwise under the internal files directory. The choice is
//! made once and kept for the life of the owning [`CacheDirectory`].

use bridge_traits::StorageContext;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Pick the cache root for `context` without memoizing.
pub fn resolve_directory(context: &dyn StorageContext) -> PathBuf {
    match context.external_files_dir() {
        Some(dir) => {
            debug!(path = %dir.display(), "Using external storage for cache");
            dir
        }
        None => {
            let dir = context.files_dir();
            info!(path = %dir.display(), "External storage unavailable, using internal files dir");
            dir
        }
    }
}

/// Memoized cache root.
#[derive(Debug, Default)]
pub struct CacheDirectory {
    resolved: OnceLock<PathBuf>,
}

impl CacheDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve on first call; later calls return the stored path and never
    /// consult `context` again.
    pub fn resolve(&self, context: &dyn StorageContext) -> &Path {
        self.resolved.get_or_init(|| resolve_directory(context))
    }

    /// The stored path, if resolution has happened.
    pub fn get(&self) -> Option<&Path> {
        self.resolved.get().map(PathBuf::as_path)
    }
}
