//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse},
};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{LOCATION, RANGE};
use reqwest::{redirect, Client, Url};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on redirect hops for a single request.
pub const MAX_REDIRECTS: usize = 20;

/// Reqwest-based HTTP client implementation
///
/// Provides HTTP operations with:
/// - Connection pooling via reqwest
/// - Manual redirect following so `allow_cross_protocol_redirects` can be
///   decided per request
/// - TLS support by default
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default timeouts
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Duration::from_secs(8), Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom connect and overall timeouts
    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    ///
    /// The client must be built with `redirect::Policy::none()`, otherwise
    /// reqwest follows redirects before the cross-protocol check runs.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    /// Build reqwest request for one hop of the redirect chain
    fn build_request(&self, request: &HttpRequest, url: Url) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(Self::convert_method(request.method), url);

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if let Some(range) = request.range {
            if !range.is_full() {
                req = req.header(RANGE, range.header_value());
            }
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    fn map_send_error(url: &Url, e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Timeout(url.to_string())
        } else if e.is_connect() {
            BridgeError::OperationFailed(format!("Connection failed for {}: {}", url, e))
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

/// Whether following `from -> to` changes protocol.
fn is_cross_protocol(from: &Url, to: &Url) -> bool {
    from.scheme() != to.scheme()
}

impl ReqwestHttpClient {
    /// Send `request`, following redirects, and return the first
    /// non-redirect response with the URL it came from.
    async fn send_following_redirects(
        &self,
        request: &HttpRequest,
    ) -> Result<(reqwest::Response, Url)> {
        let mut url = Url::parse(&request.url).map_err(|e| {
            BridgeError::OperationFailed(format!("Invalid URL {}: {}", request.url, e))
        })?;
        let mut redirects = 0usize;

        loop {
            debug!(
                url = %url,
                range = ?request.range,
                headers = request.headers.len(),
                "Executing HTTP request"
            );

            let response = self
                .build_request(request, url.clone())
                .send()
                .await
                .map_err(|e| Self::map_send_error(&url, e))?;

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let Some(location) = location.filter(|_| response.status().is_redirection()) else {
                return Ok((response, url));
            };

            let next = url.join(&location).map_err(|e| {
                BridgeError::OperationFailed(format!(
                    "Invalid redirect location {}: {}",
                    location, e
                ))
            })?;

            if !request.allow_cross_protocol_redirects && is_cross_protocol(&url, &next) {
                warn!(from = %url, to = %next, "Refusing cross-protocol redirect");
                return Err(BridgeError::RedirectRefused {
                    from: url.to_string(),
                    to: next.to_string(),
                });
            }

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(BridgeError::TooManyRedirects(MAX_REDIRECTS));
            }

            debug!(from = %url, to = %next, hop = redirects, "Following redirect");
            url = next;
        }
    }
}

fn collect_headers(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
        .collect()
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (response, url) = self.send_following_redirects(&request).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_send_error(&url, e))?;

        debug!(url = %url, status, size = body.len(), "HTTP response");

        Ok(HttpResponse {
            status,
            headers,
            body,
            final_url: url.to_string(),
        })
    }

    async fn execute_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        let (response, url) = self.send_following_redirects(&request).await?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);

        debug!(url = %url, status, "HTTP response head received");

        let body_url = url.clone();
        let body = response
            .bytes_stream()
            .map_err(move |e| Self::map_send_error(&body_url, e))
            .boxed();

        Ok(HttpStreamResponse {
            status,
            headers,
            body,
            final_url: url.to_string(),
        })
    }
}
