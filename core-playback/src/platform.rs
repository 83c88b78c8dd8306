//! Host collaborators handed to asset pipelines.

use crate::cache::CacheContext;
use bridge_traits::{HttpClient, StorageContext};
use std::sync::Arc;

/// Storage and transport from the host, plus the cache context to use.
#[derive(Clone)]
pub struct PlatformContext {
    pub storage: Arc<dyn StorageContext>,
    pub http_client: Arc<dyn HttpClient>,
    pub cache: Arc<CacheContext>,
}

impl PlatformContext {
    /// Context backed by the process-wide [`CacheContext::global`].
    pub fn new(storage: Arc<dyn StorageContext>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            storage,
            http_client,
            cache: CacheContext::global(),
        }
    }

    /// Use an explicitly owned cache context instead of the global one.
    pub fn with_cache_context(mut self, cache: Arc<CacheContext>) -> Self {
        self.cache = cache;
        self
    }
}
