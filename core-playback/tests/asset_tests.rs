//! End-to-end tests from an asset reference to bytes
//!
//! The host HTTP client is mocked so each test can check the exact request
//! that reached the transport.

use async_trait::async_trait;
use bridge_desktop::DesktopStorageContext;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{HttpClient, HttpRequest, HttpResponse, StorageContext};
use bytes::Bytes;
use core_playback::datasource::DEFAULT_USER_AGENT;
use core_playback::{
    AssetReference, CacheConfig, CacheContext, PlatformContext, StreamingFormat, VideoAsset,
};
use mockall::mock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

const BODY: &[u8] = b"#EXTM3U\n#EXT-X-VERSION:3\n";

fn temp_root(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("vpc-asset-{}-{}", tag, uuid::Uuid::new_v4()))
}

fn ok_response(request: &HttpRequest) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from_static(BODY),
        final_url: request.url.clone(),
    }
}

fn platform(client: MockHttpClient, storage: Arc<dyn StorageContext>) -> PlatformContext {
    PlatformContext::new(storage, Arc::new(client))
        .with_cache_context(Arc::new(CacheContext::new(CacheConfig::default())))
}

fn desktop_storage(tag: &str) -> Arc<dyn StorageContext> {
    Arc::new(DesktopStorageContext::with_directories(None, temp_root(tag)))
}

fn reference(uri: &str, format: StreamingFormat, headers: &[(&str, &str)]) -> AssetReference {
    AssetReference {
        uri: Some(uri.to_string()),
        format,
        headers: headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[tokio::test]
async fn test_headers_and_user_agent_reach_transport() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .withf(|request| {
            request.headers.get("User-Agent").map(String::as_str) == Some("X")
                && request.headers.get("Accept-Language").map(String::as_str) == Some("en")
                && request.allow_cross_protocol_redirects
        })
        .times(1)
        .returning(|request| Ok(ok_response(&request)));

    let platform = platform(client, desktop_storage("headers"));
    let asset = VideoAsset::try_from(reference(
        "https://cdn.example.com/live.m3u8",
        StreamingFormat::HttpLive,
        &[("User-Agent", "X"), ("Accept-Language", "en")],
    ))
    .unwrap();

    let factory = asset.media_source_factory(&platform).await;
    assert_eq!(factory.descriptor().mime_type, Some("application/x-mpegURL"));

    let body = factory.create_media_source().read(0, None).await.unwrap();
    assert_eq!(body.as_ref(), BODY);
}

#[tokio::test]
async fn test_default_user_agent_without_header() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .withf(|request| {
            request.headers.get("User-Agent").map(String::as_str) == Some(DEFAULT_USER_AGENT)
                && request.headers.len() == 1
        })
        .times(1)
        .returning(|request| Ok(ok_response(&request)));

    let platform = platform(client, desktop_storage("default-ua"));
    let asset = VideoAsset::try_from(reference(
        "https://cdn.example.com/manifest.mpd",
        StreamingFormat::DynamicAdaptive,
        &[],
    ))
    .unwrap();

    let source = asset.media_source_factory(&platform).await.create_media_source();
    assert_eq!(source.descriptor().mime_type, Some("application/dash+xml"));
    source.read(0, None).await.unwrap();
}

#[tokio::test]
async fn test_repeat_playback_hits_cache() {
    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .times(1)
        .returning(|request| Ok(ok_response(&request)));

    let storage = desktop_storage("repeat");
    let platform = platform(client, storage.clone());
    let asset = VideoAsset::try_from(reference(
        "https://cdn.example.com/movie.ism/Manifest",
        StreamingFormat::Smooth,
        &[],
    ))
    .unwrap();

    let first = asset
        .media_source_factory(&platform)
        .await
        .create_media_source()
        .read(0, None)
        .await
        .unwrap();
    let second = asset
        .media_source_factory(&platform)
        .await
        .create_media_source()
        .read(0, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(platform.cache.cache_init_count(), 1);

    let cache = platform.cache.disk_cache(storage.as_ref()).await.unwrap();
    assert_eq!(cache.directory(), storage.files_dir().join("downloads"));
    assert_eq!(
        cache.content_length("https://cdn.example.com/movie.ism/Manifest"),
        Some(BODY.len() as u64)
    );
}

#[tokio::test]
async fn test_unavailable_cache_plays_uncached() {
    let blocker = temp_root("blocker");
    tokio::fs::write(&blocker, b"file in the way").await.unwrap();

    let mut client = MockHttpClient::new();
    client
        .expect_execute()
        .times(2)
        .returning(|request| Ok(ok_response(&request)));

    let storage: Arc<dyn StorageContext> =
        Arc::new(DesktopStorageContext::with_directories(None, blocker));
    let platform = platform(client, storage);
    let asset = VideoAsset::try_from(reference(
        "https://cdn.example.com/v.mp4",
        StreamingFormat::Other,
        &[],
    ))
    .unwrap();

    let source = asset.media_source_factory(&platform).await.create_media_source();
    assert_eq!(source.descriptor().mime_type, None);
    assert_eq!(source.read(0, None).await.unwrap().as_ref(), BODY);
    assert_eq!(source.read(0, None).await.unwrap().as_ref(), BODY);
    assert_eq!(platform.cache.cache_init_count(), 0);
}

#[tokio::test]
async fn test_upstream_status_error_surfaces() {
    let mut client = MockHttpClient::new();
    client.expect_execute().times(1).returning(|request| {
        Ok(HttpResponse {
            status: 403,
            headers: HashMap::new(),
            body: Bytes::new(),
            final_url: request.url,
        })
    });

    let platform = platform(client, desktop_storage("forbidden"));
    let asset = VideoAsset::try_from(reference(
        "https://cdn.example.com/private.mp4",
        StreamingFormat::Other,
        &[],
    ))
    .unwrap();

    let err = asset
        .media_source_factory(&platform)
        .await
        .create_media_source()
        .read(0, Some(1024))
        .await
        .unwrap_err();
    assert!(err.is_network_error());
}

#[tokio::test]
async fn test_local_asset_reads_file_without_network() {
    let path = temp_root("local").with_extension("mp4");
    tokio::fs::write(&path, b"local-bytes").await.unwrap();

    let mut client = MockHttpClient::new();
    client.expect_execute().times(0);

    let platform = platform(client, desktop_storage("local-storage"));
    let asset = VideoAsset::try_from(reference(
        &format!("file://{}", path.display()),
        StreamingFormat::Other,
        &[],
    ))
    .unwrap();
    assert!(matches!(asset, VideoAsset::Local { .. }));

    let source = asset.media_source_factory(&platform).await.create_media_source();
    assert_eq!(source.read(6, None).await.unwrap().as_ref(), b"bytes");
    assert_eq!(platform.cache.cache_init_count(), 0);
}
