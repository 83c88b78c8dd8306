//! Storage Context Implementation using platform app directories

use bridge_traits::storage::StorageContext;
use std::path::PathBuf;
use tracing::debug;

/// Desktop storage context
///
/// - external: the per-user data directory (`dirs::data_dir()/<app>`), which
///   some environments (containers, minimal CI images) do not define
/// - internal: `~/.<app>`, falling back to the temp directory when no home
///   directory is known
#[derive(Debug, Clone)]
pub struct DesktopStorageContext {
    external_dir: Option<PathBuf>,
    internal_dir: PathBuf,
}

impl DesktopStorageContext {
    /// Create a context using the platform directories for `app_name`
    pub fn new(app_name: &str) -> Self {
        let external_dir = dirs::data_dir().map(|dir| dir.join(app_name));

        let internal_dir = dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!(".{}", app_name));

        debug!(external = ?external_dir, internal = ?internal_dir, "Desktop storage context");

        Self {
            external_dir,
            internal_dir,
        }
    }

    /// Create a context with explicit directories
    pub fn with_directories(external_dir: Option<PathBuf>, internal_dir: PathBuf) -> Self {
        Self {
            external_dir,
            internal_dir,
        }
    }
}

impl StorageContext for DesktopStorageContext {
    fn external_files_dir(&self) -> Option<PathBuf> {
        self.external_dir.clone()
    }

    fn files_dir(&self) -> PathBuf {
        self.internal_dir.clone()
    }
}
