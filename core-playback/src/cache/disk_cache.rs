//! Disk cache
//!
//! Byte ranges of upstream resources stored as span files under one
//! directory, indexed by [`CacheIndex`]. A key maps to an ordered set of
//! spans plus the total content length once it is known.
//!
//! Span files are named `<sha256(key)>.<position>.<last_touch_ms>.span` and
//! are written to a temporary file first, then renamed into place, so a
//! reader never observes a partially written span. Opening the cache deletes
//! temporary files and span files the index does not know about.

use super::evictor::CacheEvictor;
use super::index::{CacheIndex, SpanRecord};
use crate::error::{PlaybackError, Result};
use bytes::{Bytes, BytesMut};
use core_runtime::logging::strip_path;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};

const SPAN_SUFFIX: &str = "span";
const TEMP_SUFFIX: &str = "tmp";

/// A contiguous cached byte range backed by one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSpan {
    pub key: String,
    pub position: u64,
    pub length: u64,
    pub file: PathBuf,
    pub last_touch_ms: i64,
}

impl CacheSpan {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.position + self.length
    }

    fn from_record(directory: &Path, record: SpanRecord) -> Self {
        Self {
            file: directory.join(&record.file_name),
            key: record.key,
            position: record.position,
            length: record.length,
            last_touch_ms: record.last_touch_ms,
        }
    }
}

#[derive(Debug, Default)]
struct CachedContent {
    content_length: Option<u64>,
    spans: BTreeMap<u64, CacheSpan>,
}

/// Slice of a span file that contributes to a read.
struct ReadSegment {
    span: CacheSpan,
    offset: u64,
    length: u64,
}

/// Span file name for `key` at `position`.
pub fn span_file_name(key: &str, position: u64, last_touch_ms: i64) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    format!("{}.{}.{}.{}", digest, position, last_touch_ms, SPAN_SUFFIX)
}

/// Unbounded on-disk cache.
pub struct DiskCache {
    directory: PathBuf,
    index: Arc<CacheIndex>,
    evictor: Box<dyn CacheEvictor>,
    contents: RwLock<HashMap<String, CachedContent>>,
}

impl DiskCache {
    /// Open the cache rooted at `directory`, reloading every span recorded in
    /// `index`. Spans whose file has disappeared are dropped from the index,
    /// and files left behind by interrupted writes are deleted.
    #[instrument(skip_all, fields(directory = %directory.display()))]
    pub async fn open(
        directory: PathBuf,
        index: Arc<CacheIndex>,
        evictor: Box<dyn CacheEvictor>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            PlaybackError::CacheError(format!(
                "Failed to create cache directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let mut contents: HashMap<String, CachedContent> = HashMap::new();
        for record in index.load_content().await? {
            contents.entry(record.key).or_default().content_length = record.content_length;
        }

        let mut loaded = 0usize;
        let mut dropped = 0usize;
        for record in index.load_spans().await? {
            let span = CacheSpan::from_record(&directory, record);
            if !tokio::fs::try_exists(&span.file).await.unwrap_or(false) {
                debug!(file = %strip_path(&span.file.to_string_lossy()), "Span file missing, dropping");
                index.remove_span(&span.key, span.position).await?;
                dropped += 1;
                continue;
            }
            evictor.on_span_added(&span);
            contents
                .entry(span.key.clone())
                .or_default()
                .spans
                .insert(span.position, span);
            loaded += 1;
        }

        let known: HashSet<PathBuf> = contents
            .values()
            .flat_map(|content| content.spans.values())
            .map(|span| span.file.clone())
            .collect();
        let orphans = remove_orphan_files(&directory, &known).await?;

        info!(
            keys = contents.len(),
            spans = loaded,
            dropped,
            orphans,
            "Disk cache opened"
        );

        Ok(Self {
            directory,
            index,
            evictor,
            contents: RwLock::new(contents),
        })
    }

    /// Directory holding the span files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Every cache key with recorded content, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.contents.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total length of the content behind `key`, once known.
    pub fn content_length(&self, key: &str) -> Option<u64> {
        self.contents
            .read()
            .get(key)
            .and_then(|content| content.content_length)
    }

    /// Record the total length of the content behind `key`.
    pub async fn set_content_length(&self, key: &str, length: u64) -> Result<()> {
        self.index.set_content_length(key, length).await?;
        self.contents
            .write()
            .entry(key.to_string())
            .or_default()
            .content_length = Some(length);
        Ok(())
    }

    /// Spans cached for `key`, ordered by position.
    pub fn spans(&self, key: &str) -> Vec<CacheSpan> {
        self.contents
            .read()
            .get(key)
            .map(|content| content.spans.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of contiguous bytes cached for `key` starting at `position`,
    /// capped at `max` when given.
    pub fn cached_length(&self, key: &str, position: u64, max: Option<u64>) -> u64 {
        self.plan_read(key, position, max.unwrap_or(u64::MAX))
            .iter()
            .map(|segment| segment.length)
            .sum()
    }

    /// Total bytes held in span files.
    pub fn cache_space(&self) -> u64 {
        self.contents
            .read()
            .values()
            .flat_map(|content| content.spans.values())
            .map(|span| span.length)
            .sum()
    }

    /// Read up to `length` contiguous cached bytes for `key` from `position`.
    ///
    /// Returns fewer bytes than requested when the cached run ends early.
    /// A span whose file cannot be read is dropped and the read fails.
    pub async fn read(&self, key: &str, position: u64, length: u64) -> Result<Bytes> {
        let segments = self.plan_read(key, position, length);
        let total: u64 = segments.iter().map(|segment| segment.length).sum();
        let mut buffer = BytesMut::with_capacity(total as usize);

        for segment in segments {
            match read_span_file(&segment.span.file, segment.offset, segment.length).await {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(e) => {
                    warn!(
                        file = %strip_path(&segment.span.file.to_string_lossy()),
                        error = %e,
                        "Failed to read span file"
                    );
                    self.drop_span(&segment.span).await;
                    return Err(PlaybackError::CacheError(format!(
                        "Failed to read cached span at {}: {}",
                        segment.span.position, e
                    )));
                }
            }
        }

        Ok(buffer.freeze())
    }

    /// Store `data` as a span of `key` starting at `position`.
    ///
    /// A span already recorded at the same position is replaced.
    pub async fn write_fragment(&self, key: &str, position: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let last_touch_ms = chrono::Utc::now().timestamp_millis();
        let file_name = span_file_name(key, position, last_touch_ms);
        let file = self.directory.join(&file_name);
        let temp = self.directory.join(format!("{}.{}", file_name, TEMP_SUFFIX));

        tokio::fs::write(&temp, data).await.map_err(|e| {
            PlaybackError::CacheError(format!("Failed to write span {}: {}", file_name, e))
        })?;
        if let Err(e) = tokio::fs::rename(&temp, &file).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(PlaybackError::CacheError(format!(
                "Failed to commit span {}: {}",
                file_name, e
            )));
        }

        let record = SpanRecord {
            key: key.to_string(),
            position,
            length: data.len() as u64,
            file_name,
            last_touch_ms,
        };
        let indexed = match self.index.ensure_content(key).await {
            Ok(()) => self.index.put_span(&record).await,
            Err(e) => Err(e),
        };
        if let Err(e) = indexed {
            let _ = tokio::fs::remove_file(&file).await;
            return Err(e);
        }

        let span = CacheSpan::from_record(&self.directory, record);
        let replaced = self
            .contents
            .write()
            .entry(key.to_string())
            .or_default()
            .spans
            .insert(position, span.clone());

        if let Some(old) = replaced {
            if old.file != span.file {
                self.evictor.on_span_removed(&old);
                let _ = tokio::fs::remove_file(&old.file).await;
            }
        }
        self.evictor.on_span_added(&span);

        debug!(position, length = span.length, "Cached fragment");
        Ok(())
    }

    fn plan_read(&self, key: &str, position: u64, length: u64) -> Vec<ReadSegment> {
        let contents = self.contents.read();
        let Some(content) = contents.get(key) else {
            return Vec::new();
        };

        let limit = position.saturating_add(length);
        let mut segments = Vec::new();
        let mut cursor = position;
        while cursor < limit {
            // Among spans starting at or before the cursor, take the one reaching furthest
            let Some(span) = content
                .spans
                .range(..=cursor)
                .map(|(_, span)| span)
                .filter(|span| span.end() > cursor)
                .max_by_key(|span| span.end())
            else {
                break;
            };

            let segment_end = span.end().min(limit);
            segments.push(ReadSegment {
                span: span.clone(),
                offset: cursor - span.position,
                length: segment_end - cursor,
            });
            cursor = segment_end;
        }
        segments
    }

    async fn drop_span(&self, span: &CacheSpan) {
        let removed = {
            let mut contents = self.contents.write();
            match contents.get_mut(&span.key) {
                Some(content)
                    if content
                        .spans
                        .get(&span.position)
                        .is_some_and(|current| current.file == span.file) =>
                {
                    content.spans.remove(&span.position)
                }
                _ => None,
            }
        };

        if let Some(removed) = removed {
            if let Err(e) = self.index.remove_span(&removed.key, removed.position).await {
                warn!(error = %e, "Failed to remove span from cache index");
            }
            self.evictor.on_span_removed(&removed);
            let _ = tokio::fs::remove_file(&removed.file).await;
        }
    }
}

/// Delete temporary files and span files not in `known`.
async fn remove_orphan_files(directory: &Path, known: &HashSet<PathBuf>) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(directory).await?;
    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let orphan = match path.extension().and_then(|ext| ext.to_str()) {
            Some(TEMP_SUFFIX) => true,
            Some(SPAN_SUFFIX) => !known.contains(&path),
            _ => false,
        };
        if !orphan {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(
                file = %strip_path(&path.to_string_lossy()),
                error = %e,
                "Failed to remove orphaned cache file"
            ),
        }
    }
    Ok(removed)
}

async fn read_span_file(path: &Path, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buffer = vec![0u8; length as usize];
    file.read_exact(&mut buffer).await?;
    Ok(buffer)
}
