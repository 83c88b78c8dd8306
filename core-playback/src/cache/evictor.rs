//! Eviction hook for the disk cache.

use super::disk_cache::CacheSpan;

/// Receives span lifecycle events and decides what to evict.
///
/// The disk cache calls these synchronously after its span map is updated.
pub trait CacheEvictor: Send + Sync {
    /// A span was recorded.
    fn on_span_added(&self, span: &CacheSpan);

    /// A span was dropped.
    fn on_span_removed(&self, span: &CacheSpan);
}

/// Evictor that never evicts; the cache grows without bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpCacheEvictor;

impl CacheEvictor for NoOpCacheEvictor {
    fn on_span_added(&self, _span: &CacheSpan) {}

    fn on_span_removed(&self, _span: &CacheSpan) {}
}
