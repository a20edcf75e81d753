//! Domain model types.
//!
//! Entities owned by the corpus store ([`Dataset`], [`Example`]) and the
//! dynamically-typed row representation ([`Value`], [`Row`]) exchanged by
//! the format codecs.

mod dataset;
mod value;

pub use dataset::{
    CreateDataset, Dataset, DatasetSchema, Example, ExampleDraft, ExampleSource, FieldType,
    SchemaField, UpdateDataset,
};
pub use value::{Row, Value};
