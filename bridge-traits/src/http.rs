//! HTTP Client Abstraction
//!
//! Async HTTP transport used as the upstream of the playback data path.
//! The core builds requests (headers, byte ranges, redirect policy) and the
//! host supplies the transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Inclusive byte range for a `Range` request header.
///
/// `end == None` requests everything from `start` to the end of the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Range starting at `start` and spanning `length` bytes, or open-ended.
    pub fn new(start: u64, length: Option<u64>) -> Self {
        Self {
            start,
            end: length.map(|len| start + len.saturating_sub(1)),
        }
    }

    /// Whether this range covers the whole resource (`bytes=0-`).
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub range: Option<ByteRange>,
    pub timeout: Option<Duration>,
    /// Follow redirects that switch scheme (e.g. `https` -> `http`).
    pub allow_cross_protocol_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            range: None,
            timeout: None,
            allow_cross_protocol_redirects: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.headers.insert(key.into(), value.into());
        }
        self
    }

    pub fn range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn allow_cross_protocol_redirects(mut self, allow: bool) -> Self {
        self.allow_cross_protocol_redirects = allow;
        self
    }
}

/// HTTP response
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// URL the body was served from after following redirects.
    pub final_url: String,
}

impl HttpResponse {
    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `206 Partial Content`
    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    /// `416 Range Not Satisfiable`
    pub fn is_range_not_satisfiable(&self) -> bool {
        self.status == 416
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response body delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// HTTP response whose body is still being received
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: ByteStream,
    pub final_url: String,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_partial(&self) -> bool {
        self.status == 206
    }

    pub fn is_range_not_satisfiable(&self) -> bool {
        self.status == 416
    }
}

impl fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("final_url", &self.final_url)
            .finish_non_exhaustive()
    }
}

impl From<HttpResponse> for HttpStreamResponse {
    fn from(response: HttpResponse) -> Self {
        let body = response.body;
        Self {
            status: response.status,
            headers: response.headers,
            body: stream::once(async move { Ok(body) }).boxed(),
            final_url: response.final_url,
        }
    }
}

/// Async HTTP client trait
///
/// Implementations own connection pooling, TLS and redirect handling. They
/// must honour [`HttpRequest::allow_cross_protocol_redirects`] and attach
/// every header in [`HttpRequest::headers`] as given.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{ByteRange, HttpClient, HttpRequest};
///
/// async fn first_kilobyte(client: &dyn HttpClient) -> Result<Bytes> {
///     let request = HttpRequest::get("https://cdn.example.com/video.mp4")
///         .range(ByteRange::new(0, Some(1024)));
///     Ok(client.execute(request).await?.body)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network connection fails
    /// - Request times out
    /// - A redirect is refused or the redirect limit is exceeded
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request and stream the response body.
    ///
    /// Status and headers are available once the response head arrives.
    /// Body errors surface as items of the stream. The default
    /// implementation buffers [`HttpClient::execute`] into a single chunk.
    async fn execute_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        Ok(self.execute(request).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::get("https://example.com/a.mp4")
            .header("User-Agent", "test")
            .range(ByteRange::new(100, Some(50)))
            .allow_cross_protocol_redirects(true)
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com/a.mp4");
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert_eq!(request.range.unwrap().header_value(), "bytes=100-149");
        assert!(request.allow_cross_protocol_redirects);
    }

    #[test]
    fn test_byte_range_header() {
        assert_eq!(ByteRange::new(0, None).header_value(), "bytes=0-");
        assert_eq!(ByteRange::new(10, None).to_string(), "bytes=10-");
        assert_eq!(ByteRange::new(0, Some(1)).header_value(), "bytes=0-0");
        assert!(ByteRange::new(0, None).is_full());
        assert!(!ByteRange::new(1, None).is_full());
        assert!(!ByteRange::new(0, Some(10)).is_full());
    }

    #[test]
    fn test_http_response_status_checks() {
        let mut headers = HashMap::new();
        headers.insert("content-range".to_string(), "bytes 0-3/10".to_string());
        let response = HttpResponse {
            status: 206,
            headers,
            body: Bytes::from("test"),
            final_url: "https://example.com".to_string(),
        };

        assert!(response.is_success());
        assert!(response.is_partial());
        assert!(!response.is_range_not_satisfiable());
        assert_eq!(response.header("Content-Range"), Some("bytes 0-3/10"));
    }

    #[tokio::test]
    async fn test_buffered_response_streams_as_one_chunk() {
        let response: HttpStreamResponse = HttpResponse {
            status: 206,
            headers: HashMap::new(),
            body: Bytes::from("chunk"),
            final_url: "https://example.com".to_string(),
        }
        .into();

        assert!(response.is_partial());
        let chunks: Vec<Bytes> = response.body.map(|chunk| chunk.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from("chunk")]);
    }
}
