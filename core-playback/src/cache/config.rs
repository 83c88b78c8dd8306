//! Cache configuration

/// Default size of a single cache fragment written to disk (5 MiB).
pub const DEFAULT_FRAGMENT_SIZE: usize = 5 * 1024 * 1024;

/// Configuration for the on-disk media cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Subdirectory of the resolved cache root holding span files (default: "downloads")
    pub content_directory: String,

    /// File name of the cache index database inside the content directory
    pub index_file_name: String,

    /// Upper bound on the size of one span file written by the read-through pipeline
    pub fragment_size: usize,

    /// Serve from upstream instead of failing when the cache layer errors (default: true)
    pub ignore_cache_on_error: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            content_directory: "downloads".to_string(),
            index_file_name: "cache_index.db".to_string(),
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            ignore_cache_on_error: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set content directory name.
    pub fn with_content_directory(mut self, dir: impl Into<String>) -> Self {
        self.content_directory = dir.into();
        self
    }

    /// Set index database file name.
    pub fn with_index_file_name(mut self, name: impl Into<String>) -> Self {
        self.index_file_name = name.into();
        self
    }

    /// Set fragment size.
    pub fn with_fragment_size(mut self, bytes: usize) -> Self {
        self.fragment_size = bytes;
        self
    }

    /// Enable or disable bypassing the cache on cache errors.
    pub fn with_ignore_cache_on_error(mut self, ignore: bool) -> Self {
        self.ignore_cache_on_error = ignore;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.fragment_size == 0 {
            return Err("fragment_size must be greater than 0".to_string());
        }

        if self.content_directory.is_empty() {
            return Err("content_directory cannot be empty".to_string());
        }

        if self.index_file_name.is_empty() {
            return Err("index_file_name cannot be empty".to_string());
        }

        Ok(())
    }
}
