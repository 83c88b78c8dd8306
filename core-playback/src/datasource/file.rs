//! Local file reads for `file://` URIs and plain paths.

use super::{ByteStream, DataSource, DataSourceFactory, DataSpec};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const READ_CHUNK_SIZE: u64 = 64 * 1024;

/// Filesystem path behind a `file://` URI or plain path.
pub fn file_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileDataSourceFactory;

impl DataSourceFactory for FileDataSourceFactory {
    fn create_data_source(&self) -> Box<dyn DataSource> {
        Box::new(FileDataSource)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileDataSource;

#[async_trait]
impl DataSource for FileDataSource {
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream> {
        let path = file_path(&spec.uri);
        let mut file = tokio::fs::File::open(&path).await?;
        let file_len = file.metadata().await?.len();

        if spec.position >= file_len {
            return Ok(stream::empty().boxed());
        }

        let available = file_len - spec.position;
        let to_read = spec.length.map_or(available, |len| len.min(available));

        file.seek(SeekFrom::Start(spec.position)).await?;
        Ok(Box::pin(stream::try_unfold((file, to_read), next_chunk)))
    }
}

async fn next_chunk(
    (mut file, remaining): (tokio::fs::File, u64),
) -> Result<Option<(Bytes, (tokio::fs::File, u64))>> {
    if remaining == 0 {
        return Ok(None);
    }
    let mut buffer = vec![0u8; remaining.min(READ_CHUNK_SIZE) as usize];
    let read = file.read(&mut buffer).await?;
    if read == 0 {
        return Ok(None);
    }
    buffer.truncate(read);
    Ok(Some((Bytes::from(buffer), (file, remaining - read as u64))))
}
