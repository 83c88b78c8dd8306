//! Cache index
//!
//! SQLite metadata store behind the disk cache. It records, per cache key,
//! the known total content length and every span file holding a byte range
//! of that content. Span bytes themselves live in files next to the database.

use crate::error::{PlaybackError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const CREATE_CONTENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cached_content (
    key TEXT PRIMARY KEY NOT NULL,
    content_length INTEGER
)
"#;

const CREATE_SPANS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cached_spans (
    key TEXT NOT NULL,
    position INTEGER NOT NULL,
    length INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    last_touch_ms INTEGER NOT NULL,
    PRIMARY KEY (key, position)
)
"#;

/// One span row as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    pub key: String,
    pub position: u64,
    pub length: u64,
    pub file_name: String,
    pub last_touch_ms: i64,
}

/// Content row: cache key and its total length, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub key: String,
    pub content_length: Option<u64>,
}

/// SQLite-backed cache index.
pub struct CacheIndex {
    pool: Pool<Sqlite>,
    path: PathBuf,
}

impl CacheIndex {
    /// Open (creating if needed) the index database at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the parent directory cannot be created, the database
    /// cannot be opened or the schema cannot be applied.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                PlaybackError::CacheError(format!(
                    "Failed to create index directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            // Create database if it doesn't exist
            .create_if_missing(true)
            // WAL lets concurrent readers proceed while a span is recorded
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to open cache index");
                PlaybackError::Database(e)
            })?;

        let index = Self {
            pool,
            path: path.to_path_buf(),
        };
        index.initialize().await?;

        info!("Cache index opened");
        Ok(index)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(CREATE_CONTENT_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(CREATE_SPANS_TABLE).execute(&self.pool).await?;
        debug!("Cache index schema ready");
        Ok(())
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All content rows.
    pub async fn load_content(&self) -> Result<Vec<ContentRecord>> {
        let rows = sqlx::query("SELECT key, content_length FROM cached_content")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ContentRecord> {
                let content_length: Option<i64> = row.try_get("content_length")?;
                Ok(ContentRecord {
                    key: row.try_get("key")?,
                    content_length: content_length.map(|len| len as u64),
                })
            })
            .collect()
    }

    /// All span rows, ordered by key then position.
    pub async fn load_spans(&self) -> Result<Vec<SpanRecord>> {
        let rows = sqlx::query(
            "SELECT key, position, length, file_name, last_touch_ms \
             FROM cached_spans ORDER BY key, position",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SpanRecord> {
                let position: i64 = row.try_get("position")?;
                let length: i64 = row.try_get("length")?;
                Ok(SpanRecord {
                    key: row.try_get("key")?,
                    position: position as u64,
                    length: length as u64,
                    file_name: row.try_get("file_name")?,
                    last_touch_ms: row.try_get("last_touch_ms")?,
                })
            })
            .collect()
    }

    /// Make sure a content row exists for `key` without touching its length.
    pub async fn ensure_content(&self, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO cached_content (key, content_length) VALUES (?, NULL) \
             ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the total length of the content behind `key`.
    pub async fn set_content_length(&self, key: &str, content_length: u64) -> Result<()> {
        sqlx::query(
            "INSERT INTO cached_content (key, content_length) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET content_length = excluded.content_length",
        )
        .bind(key)
        .bind(content_length as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace the span starting at `record.position`.
    pub async fn put_span(&self, record: &SpanRecord) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO cached_spans \
             (key, position, length, file_name, last_touch_ms) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.key)
        .bind(record.position as i64)
        .bind(record.length as i64)
        .bind(&record.file_name)
        .bind(record.last_touch_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Forget the span starting at `position`.
    pub async fn remove_span(&self, key: &str, position: u64) -> Result<()> {
        sqlx::query("DELETE FROM cached_spans WHERE key = ? AND position = ?")
            .bind(key)
            .bind(position as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
