//! S3 and S3-compatible object storage source and sink.

use crate::io::sources::{ByteReader, ByteSink, ByteSource, S3Location};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tokio_util::io::StreamReader;

/// Reads one object from S3-compatible storage; writes one object on export.
pub struct ObjectStorageSource {
    location: S3Location,
}

impl ObjectStorageSource {
    /// Creates a new object storage source.
    #[must_use]
    pub const fn new(location: S3Location) -> Self {
        Self { location }
    }

    /// Builds the client: ambient environment configuration first, explicit
    /// location fields override it.
    fn client(&self) -> Result<AmazonS3> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(&self.location.bucket);

        if let Some(region) = &self.location.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.location.endpoint {
            // Path-style addressing is required by most S3-compatible stores.
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
            if endpoint.starts_with("http://") {
                builder = builder.with_allow_http(true);
            }
        }
        if let (Some(key_id), Some(secret)) = (
            &self.location.access_key_id,
            &self.location.secret_access_key,
        ) {
            builder = builder
                .with_access_key_id(key_id)
                .with_secret_access_key(secret);
        }

        builder.build().map_err(|e| Error::op("create_s3_client", e))
    }

    fn object_path(&self) -> ObjectPath {
        ObjectPath::from(self.location.key.as_str())
    }
}

#[async_trait]
impl ByteSource for ObjectStorageSource {
    async fn open(&self) -> Result<ByteReader> {
        let client = self.client()?;
        let result = client
            .get(&self.object_path())
            .await
            .map_err(|e| Error::op("get_s3_object", e))?;

        let stream = result.into_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(stream)))
    }
}

#[async_trait]
impl ByteSink for ObjectStorageSource {
    async fn write(&self, data: Bytes) -> Result<()> {
        let client = self.client()?;
        client
            .put(&self.object_path(), PutPayload::from_bytes(data))
            .await
            .map_err(|e| Error::op("put_s3_object", e))?;
        Ok(())
    }

    fn uri(&self) -> String {
        format!("s3://{}/{}", self.location.bucket, self.location.key)
    }
}
