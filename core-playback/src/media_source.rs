//! Media sources handed to the player.

use crate::asset::MediaDescriptor;
use crate::datasource::{ByteStream, DataSource, DataSourceFactory, DataSpec};
use crate::error::Result;
use bytes::Bytes;
use std::sync::Arc;

/// Produces one [`MediaSource`] per playback session.
#[derive(Clone)]
pub struct MediaSourceFactory {
    descriptor: MediaDescriptor,
    data_source_factory: Arc<dyn DataSourceFactory>,
}

impl MediaSourceFactory {
    pub fn new(descriptor: MediaDescriptor, data_source_factory: Arc<dyn DataSourceFactory>) -> Self {
        Self {
            descriptor,
            data_source_factory,
        }
    }

    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    pub fn create_media_source(&self) -> MediaSource {
        MediaSource {
            descriptor: self.descriptor.clone(),
            data_source: self.data_source_factory.create_data_source(),
        }
    }
}

/// A descriptor bound to the data source that reads its bytes.
pub struct MediaSource {
    descriptor: MediaDescriptor,
    data_source: Box<dyn DataSource>,
}

impl MediaSource {
    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    pub fn data_source(&self) -> &dyn DataSource {
        self.data_source.as_ref()
    }

    fn spec(&self, position: u64, length: Option<u64>) -> DataSpec {
        DataSpec::new(self.descriptor.uri.clone())
            .with_position(position)
            .with_length(length)
    }

    /// Stream `length` bytes (or to the end) of the descriptor's URI from `position`.
    pub async fn open(&self, position: u64, length: Option<u64>) -> Result<ByteStream> {
        self.data_source.open(&self.spec(position, length)).await
    }

    /// Read `length` bytes (or to the end) of the descriptor's URI from `position`.
    pub async fn read(&self, position: u64, length: Option<u64>) -> Result<Bytes> {
        self.data_source.read(&self.spec(position, length)).await
    }
}
