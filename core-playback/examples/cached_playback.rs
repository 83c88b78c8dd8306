//! # Cached Playback Example
//!
//! Reads the head of a remote asset twice through the cached pipeline. The
//! second read is served from the disk cache.
//!
//! Run with:
//! ```bash
//! cargo run --example cached_playback --package core-playback -- \
//!     https://example.com/stream.m3u8 HTTP_LIVE
//! ```

use bridge_desktop::{DesktopStorageContext, ReqwestHttpClient};
use core_playback::{AssetReference, PlatformContext, StreamingFormat, VideoAsset};
use core_runtime::logging::{init_logging, LogLevel, LoggingConfig};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const HEAD_BYTES: u64 = 256 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::default().with_level(LogLevel::Debug))?;

    let args: Vec<String> = env::args().collect();
    let uri = args
        .get(1)
        .cloned()
        .ok_or("usage: cached_playback <uri> [SMOOTH|DYNAMIC_ADAPTIVE|HTTP_LIVE]")?;
    let format = match args.get(2).map(String::as_str) {
        Some(name) => serde_json::from_str(&format!("\"{}\"", name))?,
        None => StreamingFormat::Other,
    };

    let mut headers = HashMap::new();
    headers.insert("Accept-Language".to_string(), "en".to_string());

    let platform = PlatformContext::new(
        Arc::new(DesktopStorageContext::new("video-platform-demo")),
        Arc::new(ReqwestHttpClient::new()?),
    );

    let asset = VideoAsset::try_from(AssetReference {
        uri: Some(uri),
        format,
        headers,
    })?;
    let factory = asset.media_source_factory(&platform).await;
    info!(mime_type = ?factory.descriptor().mime_type, "Resolved asset");

    for attempt in 1..=2 {
        let source = factory.create_media_source();
        let started = Instant::now();
        let bytes = source.read(0, Some(HEAD_BYTES)).await?;
        info!(
            attempt,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Read asset head"
        );
    }

    let cache = platform.cache.disk_cache(platform.storage.as_ref()).await?;
    info!(
        directory = %cache.directory().display(),
        keys = cache.keys().len(),
        bytes = cache.cache_space(),
        "Cache contents"
    );

    Ok(())
}
