//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, with manual redirect handling so the
//!   per-request cross-protocol policy is honoured
//! - `StorageContext` using the `dirs` crate for app directories
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopStorageContext, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let storage = Arc::new(DesktopStorageContext::new("my-player"));
//!
//!     // Hand both to core_playback::PlatformContext
//!     Ok(())
//! }
//! ```

mod http;
mod storage;

pub use http::{ReqwestHttpClient, MAX_REDIRECTS};
pub use storage::DesktopStorageContext;
