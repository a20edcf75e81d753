//! Bulk example import.
//!
//! Streams rows from an external source into a dataset, tracking per-row
//! failures without aborting the whole batch.

use crate::io::formats::{self, DataFormat};
use crate::io::sources::{self, DataSource};
use crate::io::{ColumnMapping, CsvOptions};
use crate::models::{DatasetSchema, Example, ExampleSource, Row};
use crate::storage::CorpusStore;
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::io::SyncIoBridge;
use tracing::instrument;
use uuid::Uuid;

/// Longest raw-data fragment attached to a per-row error.
const RAW_FRAGMENT_MAX: usize = 256;

/// An import request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Target dataset.
    pub dataset_id: String,
    /// Where the bytes live.
    pub source: DataSource,
    /// How the bytes are encoded.
    pub format: DataFormat,
    /// Projection from source columns to example fields. Empty means the
    /// whole row becomes the input map.
    pub column_mappings: Vec<ColumnMapping>,
    /// Delimited-text options.
    pub csv_options: CsvOptions,
    /// Record invalid rows and keep going instead of aborting on the first.
    pub skip_invalid: bool,
    /// Stop after this many rows, discarding the rest without error.
    /// 0 means unlimited.
    pub max_rows: usize,
}

/// A structured per-row import failure.
#[derive(Debug, Clone)]
pub struct ImportError {
    /// 1-based row number in the source.
    pub row_number: usize,
    /// What went wrong.
    pub message: String,
    /// A fragment of the offending row, for diagnosability.
    pub raw_data: String,
}

/// Result of an import operation.
///
/// Partial success is reported explicitly: counts plus the per-row error
/// list, never an opaque boolean.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Rows stored as examples.
    pub imported_count: usize,
    /// Rows parsed but rejected by validation.
    pub skipped_count: usize,
    /// Recorded errors, including a terminal parse error if one fired.
    pub error_count: usize,
    /// The per-row errors.
    pub errors: Vec<ImportError>,
}

/// Orchestrates source → codec → mapping → validation → store.
pub struct ImportService {
    store: Arc<dyn CorpusStore>,
}

impl ImportService {
    /// Creates a new import service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store }
    }

    /// Imports examples from an external source into a dataset.
    ///
    /// Rows failing schema validation become [`ImportError`] entries unless
    /// `skip_invalid` is off, in which case the first invalid row aborts the
    /// import with nothing staged. A terminal codec error truncates the
    /// stream; rows delivered before it are still imported when
    /// `skip_invalid` is on.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset does not exist, the source cannot be
    /// opened, or (with `skip_invalid` off) any row is invalid.
    #[instrument(skip(self, request), fields(dataset_id = %request.dataset_id, format = %request.format))]
    pub async fn import(&self, request: ImportRequest) -> Result<ImportResult> {
        let dataset = self
            .store
            .get_dataset(&request.dataset_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                entity: "dataset",
                id: request.dataset_id.clone(),
            })?;

        let source = sources::resolve(&request.source)?;
        let reader = source.open().await?;

        let parser = formats::parser_for(request.format);
        let mut stream = parser.parse(Box::new(SyncIoBridge::new(reader)), &request.csv_options);

        let mut result = ImportResult::default();
        let mut staged: Vec<Example> = Vec::new();
        let now = Utc::now();
        let mut row_num = 0usize;
        let mut truncated = false;

        while let Some(row) = stream.next_row().await {
            row_num += 1;
            if request.max_rows > 0 && row_num > request.max_rows {
                truncated = true;
                break;
            }

            let (input, expected_output) = project_row(&row, &request.column_mappings);

            if let Err(message) = validate_row(&dataset.schema, &input, &expected_output) {
                if request.skip_invalid {
                    result.errors.push(ImportError {
                        row_number: row_num,
                        message,
                        raw_data: row_fragment(&row),
                    });
                    result.skipped_count += 1;
                    result.error_count += 1;
                    continue;
                }
                return Err(Error::Decode {
                    row: row_num,
                    cause: message,
                });
            }

            staged.push(Example {
                id: Uuid::new_v4().to_string(),
                dataset_id: request.dataset_id.clone(),
                input,
                expected_output,
                metadata: std::collections::BTreeMap::new(),
                source: ExampleSource::Imported,
                created_at: now,
            });
        }

        if truncated {
            // Cap reached: dropping the stream cancels the decoding worker
            // and discards the remaining input without error.
            drop(stream);
        } else if let Err(e) = stream.finish().await {
            if request.skip_invalid {
                let row_number = match &e {
                    Error::Decode { row, .. } => *row,
                    _ => row_num + 1,
                };
                result.errors.push(ImportError {
                    row_number,
                    message: e.to_string(),
                    raw_data: String::new(),
                });
                result.error_count += 1;
            } else {
                return Err(e);
            }
        }

        if !staged.is_empty() {
            self.store.add_examples(&request.dataset_id, &staged).await?;
        }
        result.imported_count = staged.len();

        tracing::debug!(
            imported = result.imported_count,
            skipped = result.skipped_count,
            errors = result.error_count,
            "import finished"
        );
        Ok(result)
    }
}

/// Applies column mappings to split a row into input and expected-output
/// maps. Unmapped source columns are dropped; with no mappings at all the
/// whole row becomes the input.
fn project_row(row: &Row, mappings: &[ColumnMapping]) -> (Row, Row) {
    if mappings.is_empty() {
        return (row.clone(), Row::new());
    }

    let mut input = Row::new();
    let mut expected_output = Row::new();
    for mapping in mappings {
        if let Some(value) = row.get(&mapping.source_column) {
            let target = if mapping.is_input {
                &mut input
            } else {
                &mut expected_output
            };
            target.insert(mapping.target_field.clone(), value.clone());
        }
    }
    (input, expected_output)
}

/// Checks required schema fields. Presence is the contract: a required
/// field must exist and not be null.
fn validate_row(schema: &DatasetSchema, input: &Row, expected_output: &Row) -> std::result::Result<(), String> {
    if schema.is_empty() {
        return Ok(());
    }

    for field in &schema.input_fields {
        if field.required && input.get(&field.name).is_none_or(crate::models::Value::is_null) {
            return Err(format!("missing required input field '{}'", field.name));
        }
    }
    for field in &schema.expected_output_fields {
        if field.required
            && expected_output
                .get(&field.name)
                .is_none_or(crate::models::Value::is_null)
        {
            return Err(format!(
                "missing required expected-output field '{}'",
                field.name
            ));
        }
    }
    Ok(())
}

/// Renders a truncated JSON fragment of the offending row.
fn row_fragment(row: &Row) -> String {
    let rendered = serde_json::to_string(row).unwrap_or_default();
    if rendered.len() <= RAW_FRAGMENT_MAX {
        return rendered;
    }
    let mut fragment: String = rendered.chars().take(RAW_FRAGMENT_MAX).collect();
    fragment.push('…');
    fragment
}
