//! Read-through cache pipeline
//!
//! Reads are served from the disk cache first. Whatever the cache cannot
//! cover is streamed from upstream behind the cached prefix. Upstream bytes
//! are written back in fragments of `fragment_size` bytes as each fragment
//! fills, so an interrupted download keeps what it already received.
//!
//! With `ignore_cache_on_error` set (the default), a failing cache read
//! sends the whole request upstream with no write-back, and a failing cache
//! write is logged while the fetched bytes are still returned. Upstream
//! errors always propagate.

use super::{ByteStream, DataSource, DataSourceFactory, DataSpec};
use crate::cache::{CacheConfig, DiskCache, DEFAULT_FRAGMENT_SIZE};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use core_runtime::logging::redact_url;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Wrap `upstream` with `cache` using the fragment size and error policy
/// from `config`.
pub fn build_read_through_pipeline(
    upstream: Arc<dyn DataSourceFactory>,
    cache: Arc<DiskCache>,
    config: &CacheConfig,
) -> CacheDataSourceFactory {
    CacheDataSourceFactory::new(cache, upstream)
        .with_fragment_size(config.fragment_size)
        .with_ignore_cache_on_error(config.ignore_cache_on_error)
}

pub struct CacheDataSourceFactory {
    cache: Arc<DiskCache>,
    upstream: Arc<dyn DataSourceFactory>,
    fragment_size: usize,
    ignore_cache_on_error: bool,
}

impl CacheDataSourceFactory {
    pub fn new(cache: Arc<DiskCache>, upstream: Arc<dyn DataSourceFactory>) -> Self {
        Self {
            cache,
            upstream,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            ignore_cache_on_error: true,
        }
    }

    pub fn with_fragment_size(mut self, fragment_size: usize) -> Self {
        self.fragment_size = fragment_size.max(1);
        self
    }

    pub fn with_ignore_cache_on_error(mut self, ignore: bool) -> Self {
        self.ignore_cache_on_error = ignore;
        self
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }
}

impl DataSourceFactory for CacheDataSourceFactory {
    fn create_data_source(&self) -> Box<dyn DataSource> {
        Box::new(CacheDataSource {
            cache: self.cache.clone(),
            upstream: self.upstream.create_data_source(),
            fragment_size: self.fragment_size,
            ignore_cache_on_error: self.ignore_cache_on_error,
        })
    }
}

pub struct CacheDataSource {
    cache: Arc<DiskCache>,
    upstream: Box<dyn DataSource>,
    fragment_size: usize,
    ignore_cache_on_error: bool,
}

impl CacheDataSource {
    async fn read_cached_prefix(&self, key: &str, spec: &DataSpec) -> Result<Bytes> {
        let cached = self.cache.cached_length(key, spec.position, spec.length);
        if cached == 0 {
            return Ok(Bytes::new());
        }
        self.cache.read(key, spec.position, cached).await
    }

    /// Whether `prefix_len` cached bytes satisfy the whole request.
    fn is_complete(&self, key: &str, spec: &DataSpec, prefix_len: u64) -> bool {
        let reaches_end = self
            .cache
            .content_length(key)
            .is_some_and(|total| spec.position + prefix_len >= total);
        match spec.length {
            Some(length) => prefix_len >= length || reaches_end,
            None => reaches_end,
        }
    }
}

#[async_trait]
impl DataSource for CacheDataSource {
    #[instrument(skip_all, fields(uri = %redact_url(&spec.uri), position = spec.position, length = ?spec.length))]
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream> {
        if spec.length == Some(0) {
            return Ok(stream::empty().boxed());
        }
        let key = spec.cache_key();

        let prefix = match self.read_cached_prefix(key, spec).await {
            Ok(prefix) => prefix,
            Err(e) if self.ignore_cache_on_error => {
                warn!(error = %e, "Cache read failed, serving from upstream");
                return self.upstream.open(spec).await;
            }
            Err(e) => return Err(e),
        };

        let prefix_len = prefix.len() as u64;
        if self.is_complete(key, spec, prefix_len) {
            debug!(bytes = prefix_len, "Served from cache");
            return Ok(stream::once(async move { Ok(prefix) }).boxed());
        }

        let remainder_spec = spec
            .clone()
            .with_position(spec.position + prefix_len)
            .with_length(spec.length.map(|length| length - prefix_len));
        let upstream = self.upstream.open(&remainder_spec).await?;
        debug!(cached = prefix_len, "Streaming remainder through cache");

        let write_through = WriteThrough {
            upstream,
            cache: self.cache.clone(),
            key: key.to_string(),
            start: remainder_spec.position,
            requested: remainder_spec.length,
            received: 0,
            written: 0,
            pending: BytesMut::new(),
            fragment_size: self.fragment_size,
            ignore_cache_on_error: self.ignore_cache_on_error,
            caching: true,
        };
        let remainder: ByteStream =
            Box::pin(stream::try_unfold(write_through, WriteThrough::next));

        if prefix.is_empty() {
            return Ok(remainder);
        }
        Ok(stream::once(async move { Ok(prefix) }).chain(remainder).boxed())
    }
}

/// Upstream body passed through to the caller while being copied into the
/// cache one fragment at a time.
struct WriteThrough {
    upstream: ByteStream,
    cache: Arc<DiskCache>,
    key: String,
    /// Absolute position of the first upstream byte.
    start: u64,
    requested: Option<u64>,
    received: u64,
    /// Bytes committed to the cache from `start`.
    written: u64,
    pending: BytesMut,
    fragment_size: usize,
    ignore_cache_on_error: bool,
    /// Cleared after a tolerated write failure.
    caching: bool,
}

impl WriteThrough {
    async fn next(mut self) -> Result<Option<(Bytes, Self)>> {
        let chunk = match self.upstream.try_next().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                self.finish().await?;
                return Ok(None);
            }
            Err(e) => {
                // Keep what arrived before the failure
                if let Err(flush_error) = self.flush().await {
                    warn!(error = %flush_error, "Failed to cache partial download");
                }
                return Err(e);
            }
        };

        self.received += chunk.len() as u64;
        if self.caching {
            self.pending.extend_from_slice(&chunk);
            while self.pending.len() >= self.fragment_size {
                let fragment = self.pending.split_to(self.fragment_size).freeze();
                self.write(fragment).await?;
            }
        }
        Ok(Some((chunk, self)))
    }

    async fn write(&mut self, fragment: Bytes) -> Result<()> {
        if !self.caching {
            return Ok(());
        }
        let position = self.start + self.written;
        match self.cache.write_fragment(&self.key, position, &fragment).await {
            Ok(()) => {
                self.written += fragment.len() as u64;
                Ok(())
            }
            Err(e) => self.tolerate(e),
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let rest = self.pending.split().freeze();
        if rest.is_empty() {
            return Ok(());
        }
        self.write(rest).await
    }

    async fn finish(&mut self) -> Result<()> {
        self.flush().await?;

        // Reading to the end, or falling short of the request, reveals the total length
        let reached_end = self
            .requested
            .map_or(true, |requested| self.received < requested);
        if self.caching && reached_end {
            let total = self.start + self.received;
            if let Err(e) = self.cache.set_content_length(&self.key, total).await {
                return self.tolerate(e);
            }
        }

        debug!(upstream = self.received, cached = self.written, "Upstream read complete");
        Ok(())
    }

    fn tolerate(&mut self, e: PlaybackError) -> Result<()> {
        if !self.ignore_cache_on_error {
            return Err(e);
        }
        warn!(error = %e, "Cache write failed, returning upstream bytes");
        self.caching = false;
        self.pending.clear();
        Ok(())
    }
}
