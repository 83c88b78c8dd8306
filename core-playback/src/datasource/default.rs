//! Scheme routing between local files and the network.

use super::file::FileDataSource;
use super::{uri_scheme, ByteStream, DataSource, DataSourceFactory, DataSpec};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Routes `file://` and scheme-less URIs to [`FileDataSource`] and every
/// other URI to the wrapped network factory.
pub struct DefaultDataSourceFactory {
    network: Arc<dyn DataSourceFactory>,
}

impl DefaultDataSourceFactory {
    pub fn new(network: Arc<dyn DataSourceFactory>) -> Self {
        Self { network }
    }
}

impl DataSourceFactory for DefaultDataSourceFactory {
    fn create_data_source(&self) -> Box<dyn DataSource> {
        Box::new(DefaultDataSource {
            file: FileDataSource,
            network: self.network.create_data_source(),
        })
    }
}

pub struct DefaultDataSource {
    file: FileDataSource,
    network: Box<dyn DataSource>,
}

#[async_trait]
impl DataSource for DefaultDataSource {
    async fn open(&self, spec: &DataSpec) -> Result<ByteStream> {
        match uri_scheme(&spec.uri).as_deref() {
            None | Some("file") => self.file.open(spec).await,
            Some(_) => self.network.open(spec).await,
        }
    }
}
