//! # Media Cache Module
//!
//! On-disk cache for upstream media bytes.
//!
//! ## Overview
//!
//! - Cache root chosen once per process (external storage, else internal)
//! - SQLite index of cached spans and content lengths
//! - Span files keyed by the request URI (or a custom cache key)
//! - No eviction: the cache grows without bound
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     CacheContext                       │
//! │  - cache_directory()                   │
//! │  - index()                             │
//! │  - disk_cache()                        │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> CacheDirectory (resolved root, memoized)
//!          ├──> CacheIndex (SQLite, <root>/downloads/cache_index.db)
//!          └──> DiskCache (span files, NoOpCacheEvictor)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::CacheContext;
//!
//! # async fn example(storage: &dyn bridge_traits::StorageContext) -> core_playback::Result<()> {
//! let cache = CacheContext::global().disk_cache(storage).await?;
//! println!("{} bytes cached", cache.cache_space());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod directory;
pub mod disk_cache;
pub mod evictor;
pub mod index;

// Re-export commonly used types
pub use config::{CacheConfig, DEFAULT_FRAGMENT_SIZE};
pub use context::CacheContext;
pub use directory::{resolve_directory, CacheDirectory};
pub use disk_cache::{span_file_name, CacheSpan, DiskCache};
pub use evictor::{CacheEvictor, NoOpCacheEvictor};
pub use index::{CacheIndex, ContentRecord, SpanRecord};
