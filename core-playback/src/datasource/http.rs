//! HTTP upstream
//!
//! [`HttpUpstreamConfig`] is derived from an asset's header map and applied
//! to every request an [`HttpDataSource`] sends through the host
//! [`HttpClient`].

use super::{ByteStream, DataSource, DataSourceFactory, DataSpec};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_runtime::logging::{redact_headers, redact_url};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// User agent sent when the asset headers carry none.
pub const DEFAULT_USER_AGENT: &str = concat!("video-platform-core/", env!("CARGO_PKG_VERSION"));

const USER_AGENT_HEADER: &str = "User-Agent";

/// Settings applied to every upstream HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpUpstreamConfig {
    pub user_agent: String,
    pub allow_cross_protocol_redirects: bool,
    /// Sent with every request.
    pub default_headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl Default for HttpUpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_cross_protocol_redirects: true,
            default_headers: HashMap::new(),
            timeout: None,
        }
    }
}

impl HttpUpstreamConfig {
    /// Build from an asset's header map.
    ///
    /// The user agent is the value under the exact key `"User-Agent"`, or
    /// [`DEFAULT_USER_AGENT`]. Cross-protocol redirects are always allowed.
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let user_agent = headers
            .get(USER_AGENT_HEADER)
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        Self {
            user_agent,
            allow_cross_protocol_redirects: true,
            default_headers: headers.clone(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Headers for one request: the defaults plus the resolved user agent.
    pub fn request_headers(&self) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = self
            .default_headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(USER_AGENT_HEADER))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        headers.insert(USER_AGENT_HEADER.to_string(), self.user_agent.clone());
        headers
    }
}

/// Creates [`HttpDataSource`]s sharing one client and configuration.
pub struct HttpDataSourceFactory {
    client: Arc<dyn HttpClient>,
    config: HttpUpstreamConfig,
}

impl HttpDataSourceFactory {
    pub fn new(client: Arc<dyn HttpClient>, config: HttpUpstreamConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpUpstreamConfig {
        &self.config
    }
}

impl DataSourceFactory for HttpDataSourceFactory {
    fn create_data_source(&self) -> Box<dyn DataSource> {
        Box::new(HttpDataSource::new(self.client.clone(), self.config.clone()))
    }
}

/// Range reads over HTTP.
pub struct HttpDataSource {
    client: Arc<dyn HttpClient>,
    config: HttpUpstreamConfig,
}

impl HttpDataSource {
    pub fn new(client: Arc<dyn HttpClient>, config: HttpUpstreamConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, spec: &DataSpec) -> HttpRequest {
        let mut request = HttpRequest::get(spec.uri.clone())
            .headers(self.config.request_headers())
            .allow_cross_protocol_redirects(self.config.allow_cross_protocol_redirects);

        let range = spec.byte_range();
        if !range.is_full() {
            request = request.range(range);
        }
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }
        request
    }
}

/// Progress through a body being clipped to the requested range.
struct ClipState {
    body: ByteStream,
    skip: u64,
    remaining: Option<u64>,
}

/// Drop the first `skip` bytes of `body` and end it after `limit` bytes.
fn clip_body(body: ByteStream, skip: u64, limit: Option<u64>) -> ByteStream {
    if skip == 0 && limit.is_none() {
        return body;
    }
    let state = ClipState {
        body,
        skip,
        remaining: limit,
    };
    Box::pin(stream::try_unfold(state, next_clipped))
}

async fn next_clipped(mut state: ClipState) -> Result<Option<(Bytes, ClipState)>> {
    loop {
        if state.remaining == Some(0) {
            return Ok(None);
        }
        let Some(mut chunk) = state.body.try_next().await? else {
            return Ok(None);
        };

        if state.skip > 0 {
            let dropped = state.skip.min(chunk.len() as u64);
            chunk = chunk.slice(dropped as usize..);
            state.skip -= dropped;
        }
        if chunk.is_empty() {
            continue;
        }
        if let Some(remaining) = state.remaining.as_mut() {
            let kept = (*remaining).min(chunk.len() as u64);
            chunk.truncate(kept as usize);
            *remaining -= kept;
        }
        return Ok(Some((chunk, state)));
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    #[instrument(skip_all, fields(uri = %redact_url(&spec.uri), position = spec.position, length = ?spec.length))]
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream> {
        if spec.length == Some(0) {
            return Ok(stream::empty().boxed());
        }

        let request = self.build_request(spec);
        debug!(headers = %redact_headers(&request.headers), "Sending upstream request");

        let response = self.client.execute_stream(request).await?;

        // Asking past the end of the resource
        if response.is_range_not_satisfiable() && spec.position > 0 {
            debug!("Range not satisfiable, treating as end of resource");
            return Ok(stream::empty().boxed());
        }

        if !response.is_success() {
            return Err(PlaybackError::HttpStatus {
                status: response.status,
                url: redact_url(&response.final_url),
            });
        }

        // A 200 to a ranged request carries the whole resource
        let skip = if response.is_partial() { 0 } else { spec.position };
        debug!(status = response.status, skip, "Streaming upstream body");

        let body = response.body.map_err(PlaybackError::from).boxed();
        Ok(clip_body(body, skip, spec.length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(parts: &[&'static str]) -> ByteStream {
        let chunks: Vec<Result<Bytes>> = parts
            .iter()
            .map(|part| Ok(Bytes::from_static(part.as_bytes())))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    #[tokio::test]
    async fn test_clip_body_skips_and_limits_across_chunks() {
        let body = clip_body(chunked(&["0123", "4567", "89"]), 3, Some(4));
        let chunks: Vec<Bytes> = body.try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from("3"), Bytes::from("456")]);

        let tail = clip_body(chunked(&["0123", "4567"]), 6, None);
        let chunks: Vec<Bytes> = tail.try_collect().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from("67")]);

        let past_end = clip_body(chunked(&["0123"]), 10, Some(2));
        assert!(past_end.try_collect::<Vec<Bytes>>().await.unwrap().is_empty());
    }

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_user_agent_from_headers() {
        let config = HttpUpstreamConfig::from_headers(&headers(&[("User-Agent", "X")]));
        assert_eq!(config.user_agent, "X");
        assert!(config.allow_cross_protocol_redirects);
        assert_eq!(config.default_headers.len(), 1);
    }

    #[test]
    fn test_default_user_agent() {
        let config = HttpUpstreamConfig::from_headers(&HashMap::new());
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(DEFAULT_USER_AGENT.starts_with("video-platform-core/"));
        assert!(config.default_headers.is_empty());
        assert!(config.allow_cross_protocol_redirects);
    }

    #[test]
    fn test_user_agent_key_is_case_sensitive() {
        let config = HttpUpstreamConfig::from_headers(&headers(&[("user-agent", "lower")]));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);

        // Only one user agent goes on the wire
        let request = config.request_headers();
        assert_eq!(request.len(), 1);
        assert_eq!(request.get("User-Agent").map(String::as_str), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn test_request_headers_pass_through() {
        let config = HttpUpstreamConfig::from_headers(&headers(&[
            ("Accept-Language", "en"),
            ("User-Agent", "tv/1"),
        ]));
        let request = config.request_headers();

        assert_eq!(request.get("Accept-Language").map(String::as_str), Some("en"));
        assert_eq!(request.get("User-Agent").map(String::as_str), Some("tv/1"));
    }

    #[test]
    fn test_with_timeout() {
        let config = HttpUpstreamConfig::default().with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }
}
