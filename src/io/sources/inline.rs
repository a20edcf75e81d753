//! Inline in-memory source.

use crate::io::sources::{ByteReader, ByteSource};
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;

/// Wraps a byte buffer already held by the caller. Never fails to open.
pub struct InlineSource {
    data: Bytes,
}

impl InlineSource {
    /// Creates a new inline source.
    #[must_use]
    pub const fn new(data: Bytes) -> Self {
        Self { data }
    }
}

#[async_trait]
impl ByteSource for InlineSource {
    async fn open(&self) -> Result<ByteReader> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}
