//! Local filesystem source.

use crate::io::sources::{ByteReader, ByteSource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads data from a file on the local filesystem.
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    /// Creates a new local file source.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ByteSource for LocalFileSource {
    async fn open(&self) -> Result<ByteReader> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            Error::op(
                "open_local_file",
                format!("{}: {e}", self.path.display()),
            )
        })?;
        Ok(Box::new(file))
    }
}
