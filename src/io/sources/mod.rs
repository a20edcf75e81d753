//! Data-source abstraction.
//!
//! A [`DataSource`] descriptor names where external bytes live; [`resolve`]
//! turns it into a readable [`ByteSource`], and [`resolve_sink`] into a
//! writable [`ByteSink`] for the locations that support export.
//!
//! The descriptor is a closed tagged union: exactly one location kind per
//! descriptor, no string-keyed registry.

mod inline;
mod local;
mod s3;
mod url;

pub use inline::InlineSource;
pub use local::LocalFileSource;
pub use s3::ObjectStorageSource;
pub use url::UrlSource;

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncRead;

/// A readable byte stream produced by a source.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Where external data lives.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A file on the local filesystem.
    LocalFile {
        /// Path to the file.
        path: PathBuf,
    },
    /// An object in S3 or an S3-compatible store.
    S3(S3Location),
    /// An HTTP(S) URL fetched with GET.
    Url {
        /// The URL to fetch.
        url: String,
        /// Extra request headers.
        headers: BTreeMap<String, String>,
    },
    /// Bytes already held by the caller.
    Inline {
        /// The payload.
        data: Bytes,
    },
    /// A Google Cloud Storage object. Not yet implemented.
    Gcs {
        /// Bucket name.
        bucket: String,
        /// Object key.
        object: String,
        /// GCP project id.
        project_id: String,
    },
}

impl DataSource {
    /// Returns the location kind name, for error messages and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::LocalFile { .. } => "local_file",
            Self::S3(_) => "s3",
            Self::Url { .. } => "url",
            Self::Inline { .. } => "inline",
            Self::Gcs { .. } => "gcs",
        }
    }
}

/// Location of one object in S3 or an S3-compatible store.
///
/// Absent fields fall back to ambient environment configuration; explicit
/// fields override it. A custom `endpoint` switches the client to
/// path-style addressing, which most non-AWS stores require.
#[derive(Debug, Clone, Default)]
pub struct S3Location {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// AWS region.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    /// Static access key id.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
}

/// Resolves a location descriptor into a readable byte stream.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Opens the source for reading.
    ///
    /// The returned reader is owned by the caller and closed when dropped,
    /// on every exit path.
    async fn open(&self) -> Result<ByteReader>;
}

/// A writable destination for exported bytes.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Writes the full payload to the destination.
    async fn write(&self, data: Bytes) -> Result<()>;

    /// The destination's addressable location, reported after export.
    fn uri(&self) -> String;
}

/// Creates a [`ByteSource`] from a location descriptor.
///
/// # Errors
///
/// Returns [`Error::NotImplemented`] for GCS locations.
pub fn resolve(source: &DataSource) -> Result<Box<dyn ByteSource>> {
    match source {
        DataSource::LocalFile { path } => Ok(Box::new(LocalFileSource::new(path.clone()))),
        DataSource::S3(location) => Ok(Box::new(ObjectStorageSource::new(location.clone()))),
        DataSource::Url { url, headers } => {
            Ok(Box::new(UrlSource::new(url.clone(), headers.clone())))
        },
        DataSource::Inline { data } => Ok(Box::new(InlineSource::new(data.clone()))),
        DataSource::Gcs { .. } => Err(Error::NotImplemented(
            "GCS data source is not yet implemented".to_string(),
        )),
    }
}

/// Creates a [`ByteSink`] from a destination descriptor.
///
/// Only object storage supports writes today.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for read-only location kinds and
/// [`Error::NotImplemented`] for GCS.
pub fn resolve_sink(destination: &DataSource) -> Result<Box<dyn ByteSink>> {
    match destination {
        DataSource::S3(location) => Ok(Box::new(ObjectStorageSource::new(location.clone()))),
        DataSource::Gcs { .. } => Err(Error::NotImplemented(
            "GCS data source is not yet implemented".to_string(),
        )),
        other => Err(Error::InvalidInput(format!(
            "destination '{}' does not support writes",
            other.kind()
        ))),
    }
}
