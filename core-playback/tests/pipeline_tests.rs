//! Tests for the read-through cache pipeline
//!
//! The upstream is a counting fake serving a fixed resource so each test can
//! assert exactly which byte ranges left the cache.

use async_trait::async_trait;
use bytes::Bytes;
use core_playback::cache::{CacheConfig, CacheIndex, DiskCache, NoOpCacheEvictor};
use core_playback::datasource::{
    build_read_through_pipeline, ByteStream, CacheDataSourceFactory, DataSource,
    DataSourceFactory, DataSpec,
};
use core_playback::{PlaybackError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const URI: &str = "https://cdn.example.com/video.mp4";

// ============================================================================
// Fake upstream
// ============================================================================

#[derive(Clone)]
struct FakeUpstream {
    resource: Bytes,
    requests: Arc<Mutex<Vec<DataSpec>>>,
    fail_with_status: Option<u16>,
    /// Body delivered in chunks of this many bytes.
    chunk_size: usize,
    /// Connection drops after this many body bytes.
    drop_after: Option<usize>,
}

impl FakeUpstream {
    fn new(len: usize) -> Self {
        let resource: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        Self {
            resource: Bytes::from(resource),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_with_status: None,
            chunk_size: 64,
            drop_after: None,
        }
    }

    fn chunked(len: usize, chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::new(len)
        }
    }

    fn dropping_after(len: usize, chunk_size: usize, drop_after: usize) -> Self {
        Self {
            drop_after: Some(drop_after),
            ..Self::chunked(len, chunk_size)
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            fail_with_status: Some(status),
            ..Self::new(0)
        }
    }

    fn slice(&self, position: u64, length: Option<u64>) -> Bytes {
        let start = (position as usize).min(self.resource.len());
        let end = length
            .map(|len| (start + len as usize).min(self.resource.len()))
            .unwrap_or(self.resource.len());
        self.resource.slice(start..end)
    }

    fn requests(&self) -> Vec<DataSpec> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for FakeUpstream {
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(spec.clone());
        if let Some(status) = self.fail_with_status {
            return Err(PlaybackError::HttpStatus {
                status,
                url: spec.uri.clone(),
            });
        }

        let body = self.slice(spec.position, spec.length);
        let delivered = self.drop_after.map_or(body.len(), |limit| limit.min(body.len()));
        let mut chunks: Vec<Result<Bytes>> = (0..delivered)
            .step_by(self.chunk_size)
            .map(|start| Ok(body.slice(start..(start + self.chunk_size).min(delivered))))
            .collect();
        if delivered < body.len() {
            chunks.push(Err(PlaybackError::Internal("connection reset".into())));
        }
        Ok(stream::iter(chunks).boxed())
    }
}

impl DataSourceFactory for FakeUpstream {
    fn create_data_source(&self) -> Box<dyn DataSource> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vpc-pipe-{}-{}", tag, uuid::Uuid::new_v4()))
}

/// Cache whose index lives outside the span directory, so the span
/// directory can be broken without touching the database.
async fn open_cache(tag: &str) -> Arc<DiskCache> {
    let root = temp_root(tag);
    let index = CacheIndex::open(&root.join("index").join("cache_index.db"))
        .await
        .unwrap();
    let cache = DiskCache::open(root.join("spans"), Arc::new(index), Box::new(NoOpCacheEvictor))
        .await
        .unwrap();
    Arc::new(cache)
}

fn pipeline(upstream: &FakeUpstream, cache: &Arc<DiskCache>) -> Box<dyn DataSource> {
    build_read_through_pipeline(
        Arc::new(upstream.clone()),
        cache.clone(),
        &CacheConfig::default(),
    )
    .create_data_source()
}

fn spec(position: u64, length: Option<u64>) -> DataSpec {
    DataSpec::new(URI).with_position(position).with_length(length)
}

// ============================================================================
// Cache hits
// ============================================================================

#[tokio::test]
async fn test_second_read_served_from_cache() {
    let upstream = FakeUpstream::new(1000);
    let cache = open_cache("hit").await;
    let source = pipeline(&upstream, &cache);

    let first = source.read(&spec(100, Some(200))).await.unwrap();
    let second = source.read(&spec(100, Some(200))).await.unwrap();

    assert_eq!(first, upstream.slice(100, Some(200)));
    assert_eq!(second, first);
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn test_cache_shared_across_sessions() {
    let upstream = FakeUpstream::new(64);
    let cache = open_cache("sessions").await;

    pipeline(&upstream, &cache)
        .read(&spec(0, Some(64)))
        .await
        .unwrap();
    let body = pipeline(&upstream, &cache)
        .read(&spec(16, Some(16)))
        .await
        .unwrap();

    assert_eq!(body, upstream.slice(16, Some(16)));
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn test_cached_prefix_reused_and_remainder_fetched() {
    let upstream = FakeUpstream::new(1000);
    let cache = open_cache("prefix").await;
    let source = pipeline(&upstream, &cache);

    source.read(&spec(0, Some(100))).await.unwrap();
    let body = source.read(&spec(0, Some(300))).await.unwrap();

    assert_eq!(body, upstream.slice(0, Some(300)));
    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].position, 100);
    assert_eq!(requests[1].length, Some(200));
    assert_eq!(cache.cached_length(URI, 0, None), 300);
}

#[tokio::test]
async fn test_open_ended_read_records_content_length() {
    let upstream = FakeUpstream::new(500);
    let cache = open_cache("open-ended").await;
    let source = pipeline(&upstream, &cache);

    let first = source.read(&spec(0, None)).await.unwrap();
    assert_eq!(first.len(), 500);
    assert_eq!(cache.content_length(URI), Some(500));

    // Fully cached to the end: no upstream call
    let tail = source.read(&spec(400, None)).await.unwrap();
    assert_eq!(tail, upstream.slice(400, None));
    let past_end = source.read(&spec(500, None)).await.unwrap();
    assert!(past_end.is_empty());
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn test_open_ended_read_without_known_length_goes_upstream() {
    let upstream = FakeUpstream::new(100);
    let cache = open_cache("unknown-length").await;
    let source = pipeline(&upstream, &cache);

    source.read(&spec(0, Some(100))).await.unwrap();
    assert_eq!(cache.content_length(URI), None);

    let body = source.read(&spec(0, None)).await.unwrap();
    assert_eq!(body.len(), 100);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].position, 100);
    assert_eq!(cache.content_length(URI), Some(100));
}

#[tokio::test]
async fn test_read_past_known_end_served_from_cache() {
    let upstream = FakeUpstream::new(500);
    let cache = open_cache("past-end").await;
    let source = pipeline(&upstream, &cache);

    let first = source.read(&spec(0, Some(1000))).await.unwrap();
    assert_eq!(first.len(), 500);
    assert_eq!(cache.content_length(URI), Some(500));

    let second = source.read(&spec(0, Some(1000))).await.unwrap();
    assert_eq!(second, first);
    let tail = source.read(&spec(400, Some(1000))).await.unwrap();
    assert_eq!(tail, upstream.slice(400, None));
    assert_eq!(upstream.requests().len(), 1);
}

#[tokio::test]
async fn test_fetched_bytes_written_in_fragments() {
    let upstream = FakeUpstream::new(10);
    let cache = open_cache("fragments").await;
    let source = build_read_through_pipeline(
        Arc::new(upstream.clone()),
        cache.clone(),
        &CacheConfig::default().with_fragment_size(4),
    )
    .create_data_source();

    source.read(&spec(0, Some(10))).await.unwrap();

    let spans = cache.spans(URI);
    let layout: Vec<(u64, u64)> = spans.iter().map(|s| (s.position, s.length)).collect();
    assert_eq!(layout, vec![(0, 4), (4, 4), (8, 2)]);
}

#[tokio::test]
async fn test_custom_cache_key_shared_between_uris() {
    let upstream = FakeUpstream::new(50);
    let cache = open_cache("custom-key").await;
    let source = pipeline(&upstream, &cache);

    let a = DataSpec::new("https://edge-a.example.com/v.mp4?sig=1")
        .with_length(Some(50))
        .with_key("video-7");
    let b = DataSpec::new("https://edge-b.example.com/v.mp4?sig=2")
        .with_length(Some(50))
        .with_key("video-7");

    source.read(&a).await.unwrap();
    let body = source.read(&b).await.unwrap();

    assert_eq!(body.len(), 50);
    assert_eq!(upstream.requests().len(), 1);
    assert_eq!(cache.keys(), vec!["video-7".to_string()]);
}

#[tokio::test]
async fn test_fragments_cached_while_streaming() {
    let upstream = FakeUpstream::chunked(100, 10);
    let cache = open_cache("streaming").await;
    let source = build_read_through_pipeline(
        Arc::new(upstream.clone()),
        cache.clone(),
        &CacheConfig::default().with_fragment_size(20),
    )
    .create_data_source();

    let mut body = source.open(&spec(0, Some(100))).await.unwrap();
    assert!(cache.spans(URI).is_empty());

    // Two 10-byte chunks fill the first fragment
    body.try_next().await.unwrap().unwrap();
    body.try_next().await.unwrap().unwrap();
    let layout: Vec<(u64, u64)> = cache
        .spans(URI)
        .iter()
        .map(|s| (s.position, s.length))
        .collect();
    assert_eq!(layout, vec![(0, 20)]);

    let rest: Vec<Bytes> = body.try_collect().await.unwrap();
    assert_eq!(rest.len(), 8);
    assert_eq!(cache.cached_length(URI, 0, None), 100);
}

// ============================================================================
// Failure policy
// ============================================================================

#[tokio::test]
async fn test_interrupted_download_keeps_received_fragments() {
    let upstream = FakeUpstream::dropping_after(100, 10, 50);
    let cache = open_cache("interrupted").await;
    let source = build_read_through_pipeline(
        Arc::new(upstream.clone()),
        cache.clone(),
        &CacheConfig::default().with_fragment_size(20),
    )
    .create_data_source();

    let err = source.read(&spec(0, Some(100))).await.unwrap_err();
    assert!(matches!(err, PlaybackError::Internal(_)));

    let layout: Vec<(u64, u64)> = cache
        .spans(URI)
        .iter()
        .map(|s| (s.position, s.length))
        .collect();
    assert_eq!(layout, vec![(0, 20), (20, 20), (40, 10)]);
    assert_eq!(cache.content_length(URI), None);

    // A retry only fetches what the failed attempt never received
    let retry = FakeUpstream::new(100);
    let body = pipeline(&retry, &cache).read(&spec(0, Some(100))).await.unwrap();
    assert_eq!(body, retry.slice(0, Some(100)));
    assert_eq!(retry.requests()[0].position, 50);
}

#[tokio::test]
async fn test_cache_read_error_falls_back_to_upstream() {
    let upstream = FakeUpstream::new(200);
    let cache = open_cache("read-error").await;
    let source = pipeline(&upstream, &cache);

    source.read(&spec(0, Some(200))).await.unwrap();
    for span in cache.spans(URI) {
        tokio::fs::remove_file(&span.file).await.unwrap();
    }

    let body = source.read(&spec(0, Some(200))).await.unwrap();
    assert_eq!(body, upstream.slice(0, Some(200)));

    // Whole request went upstream and nothing was written back
    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1], spec(0, Some(200)));
    assert!(cache.spans(URI).is_empty());
}

#[tokio::test]
async fn test_cache_write_error_still_returns_bytes() {
    let upstream = FakeUpstream::new(300);
    let cache = open_cache("write-error").await;
    let source = pipeline(&upstream, &cache);

    // Replace the span directory with a plain file
    let directory = cache.directory().to_path_buf();
    tokio::fs::remove_dir_all(&directory).await.unwrap();
    tokio::fs::write(&directory, b"blocked").await.unwrap();

    let body = source.read(&spec(0, Some(300))).await.unwrap();
    assert_eq!(body, upstream.slice(0, Some(300)));
    assert!(cache.spans(URI).is_empty());
}

#[tokio::test]
async fn test_cache_errors_surface_when_not_ignored() {
    let upstream = FakeUpstream::new(300);
    let cache = open_cache("strict").await;
    let source = CacheDataSourceFactory::new(cache.clone(), Arc::new(upstream.clone()))
        .with_ignore_cache_on_error(false)
        .create_data_source();

    let directory = cache.directory().to_path_buf();
    tokio::fs::remove_dir_all(&directory).await.unwrap();
    tokio::fs::write(&directory, b"blocked").await.unwrap();

    let err = source.read(&spec(0, Some(300))).await.unwrap_err();
    assert!(err.is_cache_error());
}

#[tokio::test]
async fn test_upstream_error_propagates() {
    let upstream = FakeUpstream::failing(503);
    let cache = open_cache("upstream-error").await;
    let source = pipeline(&upstream, &cache);

    let err = source.read(&spec(0, Some(10))).await.unwrap_err();
    assert!(matches!(err, PlaybackError::HttpStatus { status: 503, .. }));
    assert!(err.is_network_error());
    assert!(cache.keys().is_empty());
}

#[tokio::test]
async fn test_zero_length_read_touches_nothing() {
    let upstream = FakeUpstream::new(10);
    let cache = open_cache("zero").await;
    let source = pipeline(&upstream, &cache);

    assert!(source.read(&spec(5, Some(0))).await.unwrap().is_empty());
    assert!(upstream.requests().is_empty());
}
