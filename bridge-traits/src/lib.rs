//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is provided differently per platform (desktop,
//! Android, iOS).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport for upstream reads
//! - [`StorageContext`](storage::StorageContext) - Where the app may keep files
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Android  | TBD                 | 📋 Planned |
//! | iOS      | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Platform implementations should convert platform-specific errors to
//! `BridgeError` and keep the failing URL or path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared across concurrent playback sessions.

pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{
    ByteRange, ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
};
pub use storage::StorageContext;
