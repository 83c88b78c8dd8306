//! # Data Sources
//!
//! Byte-range readers composed into the playback data path:
//!
//! ```text
//! CacheDataSource ──> DefaultDataSource ──┬──> HttpDataSource ──> HttpClient (host)
//!        │                                └──> FileDataSource
//!        └──> DiskCache
//! ```

use crate::error::Result;
use async_trait::async_trait;
use bridge_traits::ByteRange;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, TryStreamExt};

pub mod cache;
pub mod default;
pub mod file;
pub mod http;

pub use cache::{build_read_through_pipeline, CacheDataSource, CacheDataSourceFactory};
pub use default::{DefaultDataSource, DefaultDataSourceFactory};
pub use file::{FileDataSource, FileDataSourceFactory};
pub use http::{HttpDataSource, HttpDataSourceFactory, HttpUpstreamConfig, DEFAULT_USER_AGENT};

/// A read request against a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpec {
    pub uri: String,
    /// Absolute offset of the first byte.
    pub position: u64,
    /// Bytes to read; `None` reads to the end of the resource.
    pub length: Option<u64>,
    /// Cache key overriding `uri`.
    pub key: Option<String>,
}

impl DataSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            position: 0,
            length: None,
            key: None,
        }
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: Option<u64>) -> Self {
        self.length = length;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Key under which the bytes are cached.
    pub fn cache_key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.uri)
    }

    /// Byte range covered by this request.
    pub fn byte_range(&self) -> ByteRange {
        ByteRange::new(self.position, self.length)
    }
}

/// Bytes of a read, delivered as they arrive.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Reads byte ranges of a resource.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open a stream over the bytes described by `spec`.
    ///
    /// The stream may end before `spec.length` bytes when the resource ends
    /// first. An empty stream means the position is at or past the end.
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream>;

    /// Read the bytes described by `spec` into one buffer.
    async fn read(&self, spec: &DataSpec) -> Result<Bytes> {
        collect_stream(self.open(spec).await?).await
    }
}

/// Drain `stream` into a single buffer.
pub async fn collect_stream(stream: ByteStream) -> Result<Bytes> {
    let buffer = stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await?;
    Ok(buffer.freeze())
}

/// Creates a fresh [`DataSource`] per playback session.
pub trait DataSourceFactory: Send + Sync {
    fn create_data_source(&self) -> Box<dyn DataSource>;
}

/// Scheme of `uri`, lowercased, if it has one.
pub(crate) fn uri_scheme(uri: &str) -> Option<String> {
    let (scheme, _) = uri.split_once("://")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}
