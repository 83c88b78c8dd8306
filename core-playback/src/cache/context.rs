//! Cache lifecycle
//!
//! [`CacheContext`] owns the cache directory, the cache index and the disk
//! cache. Each is created at most once per context, on first use, and shared
//! by every caller afterwards. [`CacheContext::global`] is the process-wide
//! instance used by default.
//!
//! The first caller fixes the storage context: later calls that pass a
//! different [`StorageContext`] get the already-created instances.

use super::config::CacheConfig;
use super::directory::CacheDirectory;
use super::disk_cache::DiskCache;
use super::evictor::NoOpCacheEvictor;
use super::index::CacheIndex;
use crate::error::{PlaybackError, Result};
use bridge_traits::StorageContext;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, info};

static GLOBAL: OnceLock<Arc<CacheContext>> = OnceLock::new();

pub struct CacheContext {
    config: CacheConfig,
    directory: CacheDirectory,
    index: OnceCell<Arc<CacheIndex>>,
    cache: OnceCell<Arc<DiskCache>>,
    index_inits: AtomicUsize,
    cache_inits: AtomicUsize,
}

impl CacheContext {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            directory: CacheDirectory::new(),
            index: OnceCell::new(),
            cache: OnceCell::new(),
            index_inits: AtomicUsize::new(0),
            cache_inits: AtomicUsize::new(0),
        }
    }

    /// Process-wide context with the default configuration.
    pub fn global() -> Arc<CacheContext> {
        GLOBAL
            .get_or_init(|| Arc::new(CacheContext::new(CacheConfig::default())))
            .clone()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Memoized cache root.
    pub fn cache_directory(&self, context: &dyn StorageContext) -> PathBuf {
        self.directory.resolve(context).to_path_buf()
    }

    /// Directory holding span files and the index database.
    pub fn content_directory(&self, context: &dyn StorageContext) -> PathBuf {
        self.directory
            .resolve(context)
            .join(&self.config.content_directory)
    }

    /// The shared cache index, opening it on first call.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the database cannot
    /// be opened. The context stays uninitialized so a later call retries.
    pub async fn index(&self, context: &dyn StorageContext) -> Result<Arc<CacheIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                self.config
                    .validate()
                    .map_err(PlaybackError::InvalidConfig)?;
                let path = self
                    .content_directory(context)
                    .join(&self.config.index_file_name);
                debug!(path = %path.display(), "Creating cache index");
                let index = CacheIndex::open(&path).await?;
                self.index_inits.fetch_add(1, Ordering::SeqCst);
                Ok::<_, PlaybackError>(Arc::new(index))
            })
            .await?;
        Ok(index.clone())
    }

    /// The shared disk cache, opening it (and the index) on first call.
    ///
    /// # Errors
    ///
    /// Returns error if the index or the cache directory cannot be opened.
    /// The context stays uninitialized so a later call retries.
    pub async fn disk_cache(&self, context: &dyn StorageContext) -> Result<Arc<DiskCache>> {
        let cache = self
            .cache
            .get_or_try_init(|| async {
                let index = self.index(context).await?;
                let directory = self.content_directory(context);
                let cache =
                    DiskCache::open(directory, index, Box::new(NoOpCacheEvictor)).await?;
                self.cache_inits.fetch_add(1, Ordering::SeqCst);
                info!(directory = %cache.directory().display(), "Disk cache ready");
                Ok::<_, PlaybackError>(Arc::new(cache))
            })
            .await?;
        Ok(cache.clone())
    }

    /// How many times the index has been constructed.
    pub fn index_init_count(&self) -> usize {
        self.index_inits.load(Ordering::SeqCst)
    }

    /// How many times the disk cache has been constructed.
    pub fn cache_init_count(&self) -> usize {
        self.cache_inits.load(Ordering::SeqCst)
    }
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
