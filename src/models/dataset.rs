//! Dataset and example entities.

use crate::models::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an example was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleSource {
    /// Origin unknown.
    #[default]
    Unspecified,
    /// Entered by hand.
    Manual,
    /// Produced by an example generator.
    Generated,
    /// Captured from production traffic.
    Production,
    /// Loaded through the import pipeline.
    Imported,
}

impl ExampleSource {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Manual => "manual",
            Self::Generated => "generated",
            Self::Production => "production",
            Self::Imported => "imported",
        }
    }

    /// Parses a provenance string, defaulting to `Unspecified`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "manual" => Self::Manual,
            "generated" => Self::Generated,
            "production" => Self::Production,
            "imported" => Self::Imported,
            _ => Self::Unspecified,
        }
    }
}

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Integer or float.
    Number,
    /// Boolean.
    Boolean,
    /// Arbitrary nested JSON.
    Json,
    /// JSON array.
    Array,
}

impl FieldType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Array => "array",
        }
    }

    /// Parses a field type string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "json" => Some(Self::Json),
            "array" => Some(Self::Array),
            _ => None,
        }
    }
}

/// One declared field in a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name, matched against example map keys.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether imported rows must carry this field.
    #[serde(default)]
    pub required: bool,
}

/// Declared shape of a dataset's examples.
///
/// Descriptive metadata used to validate imported rows. A dataset may carry
/// an empty schema and accept arbitrary row shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Ordered input fields.
    #[serde(default)]
    pub input_fields: Vec<SchemaField>,
    /// Ordered expected-output fields.
    #[serde(default)]
    pub expected_output_fields: Vec<SchemaField>,
}

impl DatasetSchema {
    /// Returns `true` when no fields are declared on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input_fields.is_empty() && self.expected_output_fields.is_empty()
    }
}

/// A named, versioned collection of test examples.
///
/// `example_count` is a cached aggregate: it always equals the number of
/// live examples owned by this dataset and is updated atomically with each
/// example insertion/removal, never recomputed by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Opaque unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Optional link to an external prompt id (reference only, not enforced).
    pub prompt_id: Option<String>,
    /// Declared example shape.
    pub schema: DatasetSchema,
    /// Cached count of owned examples.
    pub example_count: usize,
    /// Monotonically incrementing version counter.
    pub version: u64,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// String-to-string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Creator id.
    pub created_by: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last metadata or example mutation.
    pub last_updated: DateTime<Utc>,
}

/// A single test case, owned by exactly one dataset.
///
/// Examples are never mutated in place: they are created (individually or by
/// an import batch) and destroyed (by id, or via parent dataset deletion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Opaque unique id.
    pub id: String,
    /// Owning dataset id.
    pub dataset_id: String,
    /// Input fields.
    pub input: Row,
    /// Expected output fields.
    pub expected_output: Row,
    /// String-to-string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Provenance tag.
    pub source: ExampleSource,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a dataset.
#[derive(Debug, Clone, Default)]
pub struct CreateDataset {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Optional linked prompt id.
    pub prompt_id: Option<String>,
    /// Declared example shape.
    pub schema: DatasetSchema,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// String-to-string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Creator id.
    pub created_by: String,
}

/// Input for updating a dataset's mutable metadata.
#[derive(Debug, Clone, Default)]
pub struct UpdateDataset {
    /// Id of the dataset to update.
    pub id: String,
    /// New display name.
    pub name: String,
    /// New description.
    pub description: String,
    /// New tags.
    pub tags: Vec<String>,
    /// New metadata.
    pub metadata: BTreeMap<String, String>,
}

/// Input for a single example in a bulk add.
#[derive(Debug, Clone, Default)]
pub struct ExampleDraft {
    /// Input fields.
    pub input: Row,
    /// Expected output fields.
    pub expected_output: Row,
    /// String-to-string metadata.
    pub metadata: BTreeMap<String, String>,
    /// Provenance tag.
    pub source: ExampleSource,
}
