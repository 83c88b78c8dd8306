//! # Video Assets
//!
//! Turns an [`AssetReference`] from the host into a [`MediaSourceFactory`].
//! Remote assets get the cached HTTP pipeline; local assets read the file
//! directly.

use crate::datasource::file::FileDataSourceFactory;
use crate::datasource::{
    build_read_through_pipeline, uri_scheme, DataSourceFactory, DefaultDataSourceFactory,
    HttpDataSourceFactory, HttpUpstreamConfig,
};
use crate::error::{PlaybackError, Result};
use crate::media_source::MediaSourceFactory;
use crate::platform::PlatformContext;
use core_runtime::logging::redact_url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MIME_SMOOTH_STREAMING: &str = "application/vnd.ms-sstr+xml";
pub const MIME_DASH: &str = "application/dash+xml";
pub const MIME_HLS: &str = "application/x-mpegURL";

/// Streaming format declared by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamingFormat {
    Smooth,
    DynamicAdaptive,
    HttpLive,
    /// Progressive or unrecognised; no MIME hint.
    #[default]
    #[serde(other)]
    Other,
}

impl StreamingFormat {
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            StreamingFormat::Smooth => Some(MIME_SMOOTH_STREAMING),
            StreamingFormat::DynamicAdaptive => Some(MIME_DASH),
            StreamingFormat::HttpLive => Some(MIME_HLS),
            StreamingFormat::Other => None,
        }
    }
}

/// Asset as described by the host for one playback request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetReference {
    pub uri: Option<String>,
    #[serde(default)]
    pub format: StreamingFormat,
    /// Request headers; keys are case-sensitive.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// What the player needs to know before reading any bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub uri: String,
    pub mime_type: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoAsset {
    Http {
        uri: String,
        format: StreamingFormat,
        headers: HashMap<String, String>,
    },
    Local {
        uri: String,
    },
}

impl TryFrom<AssetReference> for VideoAsset {
    type Error = PlaybackError;

    fn try_from(reference: AssetReference) -> Result<Self> {
        let uri = reference.uri.ok_or(PlaybackError::MissingUri)?;
        match uri_scheme(&uri).as_deref() {
            Some("http") | Some("https") => Ok(VideoAsset::Http {
                uri,
                format: reference.format,
                headers: reference.headers,
            }),
            None | Some("file") => Ok(VideoAsset::Local { uri }),
            Some(_) => Err(PlaybackError::InvalidUri(redact_url(&uri))),
        }
    }
}

impl VideoAsset {
    pub fn uri(&self) -> &str {
        match self {
            VideoAsset::Http { uri, .. } | VideoAsset::Local { uri } => uri,
        }
    }

    pub fn media_descriptor(&self) -> MediaDescriptor {
        let mime_type = match self {
            VideoAsset::Http { format, .. } => format.mime_type(),
            VideoAsset::Local { .. } => None,
        };
        MediaDescriptor {
            uri: self.uri().to_string(),
            mime_type,
        }
    }

    /// Build the data path for this asset.
    ///
    /// HTTP assets read through the shared disk cache. If the cache cannot be
    /// opened the asset plays uncached and the next asset retries the cache.
    pub async fn media_source_factory(&self, platform: &PlatformContext) -> MediaSourceFactory {
        let descriptor = self.media_descriptor();

        let data_source_factory: Arc<dyn DataSourceFactory> = match self {
            VideoAsset::Http { headers, .. } => {
                let http = HttpDataSourceFactory::new(
                    platform.http_client.clone(),
                    HttpUpstreamConfig::from_headers(headers),
                );
                let upstream: Arc<dyn DataSourceFactory> =
                    Arc::new(DefaultDataSourceFactory::new(Arc::new(http)));

                match platform.cache.disk_cache(platform.storage.as_ref()).await {
                    Ok(cache) => Arc::new(build_read_through_pipeline(
                        upstream,
                        cache,
                        platform.cache.config(),
                    )),
                    Err(e) => {
                        warn!(error = %e, "Disk cache unavailable, playing uncached");
                        upstream
                    }
                }
            }
            VideoAsset::Local { .. } => Arc::new(FileDataSourceFactory),
        };

        debug!(
            uri = %redact_url(&descriptor.uri),
            mime_type = ?descriptor.mime_type,
            "Media source factory ready"
        );
        MediaSourceFactory::new(descriptor, data_source_factory)
    }
}
