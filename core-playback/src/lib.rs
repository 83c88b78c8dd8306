//! # Playback Data Path
//!
//! Builds the byte pipeline behind a video asset.
//!
//! ## Overview
//!
//! This module handles:
//! - Mapping a declared streaming format to a MIME hint
//! - HTTP upstream reads with per-asset headers and user agent
//! - A process-wide, unbounded disk cache indexed in SQLite
//! - Read-through caching that falls back to upstream on cache errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::{AssetReference, PlatformContext, VideoAsset};
//!
//! # async fn example(platform: PlatformContext, reference: AssetReference) -> core_playback::Result<()> {
//! let asset = VideoAsset::try_from(reference)?;
//! let factory = asset.media_source_factory(&platform).await;
//! let source = factory.create_media_source();
//! let head = source.read(0, Some(64 * 1024)).await?;
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod cache;
pub mod datasource;
pub mod error;
pub mod media_source;
pub mod platform;

pub use asset::{AssetReference, MediaDescriptor, StreamingFormat, VideoAsset};
pub use cache::{CacheConfig, CacheContext, DiskCache};
pub use datasource::{ByteStream, DataSource, DataSourceFactory, DataSpec, HttpUpstreamConfig};
pub use error::{PlaybackError, Result};
pub use media_source::{MediaSource, MediaSourceFactory};
pub use platform::PlatformContext;
