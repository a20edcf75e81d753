//! Import/Export I/O subsystem.
//!
//! Moves examples between the corpus store and external representations.
//!
//! # Architecture
//!
//! - **Format codecs** ([`formats`]) convert byte streams to and from row
//!   sequences
//! - **Data sources** ([`sources`]) resolve location descriptors into byte
//!   streams (and, for object storage, writable sinks)
//! - **Services** ([`services`]) orchestrate source resolution, parsing,
//!   column mapping, validation, and storage
//!
//! # Supported Formats
//!
//! | Format | Import | Export | Notes |
//! |--------|--------|--------|-------|
//! | CSV | ✓ | ✓ | Type inference, configurable delimiter/quote/escape |
//! | JSONL | ✓ | ✓ | One object per line, lines up to 10 MiB and beyond |
//! | JSON | ✓ | ✓ | Single array of objects, all-or-nothing decode |
//! | Parquet | ✓ | ✓ | Fully buffered before the first row is yielded |
//!
//! # Streaming
//!
//! Each parse runs its decoding loop on a blocking worker that feeds a
//! bounded channel, so a slow consumer throttles the producer instead of
//! growing memory without bound. Dropping a [`formats::RowStream`] mid-parse
//! (cancellation, row cap) closes the channel; the worker notices on its
//! next send, returns, and drops the reader it owns.

pub mod formats;
pub mod services;
pub mod sources;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

// Re-exports for convenience
pub use formats::DataFormat;
pub use sources::DataSource;

/// Declares which source column feeds which target field during import.
///
/// Multiple mappings compose a full projection; source columns with no
/// mapping are dropped silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Column name in the parsed row.
    pub source_column: String,
    /// Field name in the example.
    pub target_field: String,
    /// `true` routes to `input`, `false` to `expected_output`.
    pub is_input: bool,
}

/// Delimited-text parsing and writing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter.
    pub delimiter: char,
    /// Whether the first record is a header row.
    pub has_header: bool,
    /// Quote character.
    pub quote: char,
    /// Escape character inside quoted fields.
    pub escape: char,
    /// Text encoding. Only UTF-8 is supported; the field is carried for
    /// wire compatibility.
    pub encoding: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            quote: '"',
            escape: '\\',
            encoding: "utf-8".to_string(),
        }
    }
}

impl CsvOptions {
    /// Converts a configured character to the single byte the csv crate
    /// needs.
    pub(crate) fn ascii_byte(c: char, name: &str) -> Result<u8> {
        if c.is_ascii() {
            u8::try_from(u32::from(c))
                .map_err(|_| Error::InvalidInput(format!("{name} is not a single byte: {c:?}")))
        } else {
            Err(Error::InvalidInput(format!(
                "{name} must be an ASCII character: {c:?}"
            )))
        }
    }
}
