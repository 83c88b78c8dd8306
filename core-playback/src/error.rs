//! # Playback Error Types
//!
//! Error types for the playback data path: asset resolution, upstream reads
//! and the on-disk cache.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Asset Errors
    // ========================================================================
    /// Asset reference carried no URI.
    #[error("Asset reference has no URI")]
    MissingUri,

    /// URI could not be routed to any data source.
    #[error("Unsupported URI: {0}")]
    InvalidUri(String),

    // ========================================================================
    // Upstream Errors
    // ========================================================================
    /// Transport-level failure reported by the host HTTP client.
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] BridgeError),

    /// Upstream answered with a non-success status.
    #[error("Upstream returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Disk cache read, write or open failure.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Cache index database failure.
    #[error("Cache index error: {0}")]
    Database(#[from] sqlx::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error originated in the cache layer.
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::CacheError(_) | PlaybackError::Database(_)
        )
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::Upstream(_) | PlaybackError::HttpStatus { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
