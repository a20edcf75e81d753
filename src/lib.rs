//! # Exemplar
//!
//! A versioned example-corpus store with streaming import/export for LLM
//! test data.
//!
//! Exemplar owns datasets of labeled input/expected-output examples and
//! moves them between the store and external representations (CSV, JSONL,
//! JSON arrays, Parquet) living in external locations (local disk, object
//! storage, HTTP, inline payloads).
//!
//! ## Architecture
//!
//! - Pluggable storage backends ([`storage::MemoryStore`],
//!   [`storage::SqliteStore`]) behind the [`storage::CorpusStore`] trait
//! - Streaming format codecs producing bounded-channel row streams
//! - A closed set of data sources selected by location descriptor
//! - Import/export orchestrators with per-row failure tracking
//!
//! ## Example
//!
//! ```rust,ignore
//! use exemplar::services::DatasetService;
//! use exemplar::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let service = DatasetService::new(Arc::new(MemoryStore::new()));
//! let dataset = service.create_dataset(CreateDataset {
//!     name: "arithmetic".to_string(),
//!     ..Default::default()
//! }).await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use thiserror::Error as ThisError;

// Module declarations
pub mod io;
pub mod models;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use io::formats::DataFormat;
pub use io::services::export::{ExportRequest, ExportResult, ExportService};
pub use io::services::import::{ImportError, ImportRequest, ImportResult, ImportService};
pub use io::sources::DataSource;
pub use io::{ColumnMapping, CsvOptions};
pub use models::{
    CreateDataset, Dataset, DatasetSchema, Example, ExampleDraft, ExampleSource, FieldType, Row,
    SchemaField, UpdateDataset, Value,
};
pub use services::DatasetService;
pub use storage::{CorpusStore, GetExamplesQuery, ListDatasetsQuery};

/// Error type for exemplar operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed descriptors, unknown formats, bad options |
/// | `NotFound` | Mutating a dataset/example that does not exist |
/// | `AlreadyExists` | Creating a dataset with a duplicate id |
/// | `Decode` | A codec fails on a specific input row |
/// | `OperationFailed` | I/O, network, object-storage, database failures |
/// | `NotImplemented` | Constructing the GCS source, other stubs |
///
/// Point lookups (`get_dataset`, `get_example`) do NOT raise `NotFound`;
/// they return `Ok(None)` so callers can distinguish "doesn't exist" from
/// "query failed".
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An entity required by a mutation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity ("dataset", "example").
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// An entity with the same id already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// The kind of entity.
        entity: &'static str,
        /// The conflicting id.
        id: String,
    },

    /// A codec failed to decode a specific row of input.
    ///
    /// `row` is 1-based: the record number for delimited text, the line
    /// number for JSONL.
    #[error("decode error at row {row}: {cause}")]
    Decode {
        /// 1-based row or line number.
        row: usize,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not yet implemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl Error {
    /// Shorthand for [`Error::OperationFailed`].
    pub(crate) fn op(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for exemplar operations.
pub type Result<T> = std::result::Result<T, Error>;
