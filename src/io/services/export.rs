//! Bulk example export.
//!
//! Projects stored examples to rows, encodes them with a format writer, and
//! either returns the bytes inline or hands them to a writable destination.

use crate::io::formats::{self, DataFormat};
use crate::io::sources::{self, DataSource};
use crate::io::CsvOptions;
use crate::models::{Example, Row, Value};
use crate::storage::{CorpusStore, GetExamplesQuery};
use crate::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;
use tracing::instrument;

/// An export request.
///
/// With no destination the encoded bytes come back inline.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Dataset to export.
    pub dataset_id: String,
    /// Target encoding.
    pub format: DataFormat,
    /// Optional external destination. `None` returns bytes inline.
    pub destination: Option<DataSource>,
    /// Delimited-text options.
    pub csv_options: CsvOptions,
    /// Page size, 0 for all examples.
    pub limit: usize,
    /// Examples to skip.
    pub offset: usize,
}

/// Result of an export operation.
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// The encoded bytes, when no external destination was given.
    pub data: Option<Bytes>,
    /// The encoding used.
    pub format: DataFormat,
    /// Number of examples exported.
    pub exported_count: usize,
    /// The destination's addressable location, when written externally.
    pub destination_uri: Option<String>,
}

/// Orchestrates store → projection → codec → destination.
pub struct ExportService {
    store: Arc<dyn CorpusStore>,
}

impl ExportService {
    /// Creates a new export service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store }
    }

    /// Exports a dataset's examples in the requested format.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset does not exist, encoding fails, or
    /// the destination rejects the write.
    #[instrument(skip(self, request), fields(dataset_id = %request.dataset_id, format = %request.format))]
    pub async fn export(&self, request: ExportRequest) -> Result<ExportResult> {
        if self.store.get_dataset(&request.dataset_id).await?.is_none() {
            return Err(Error::NotFound {
                entity: "dataset",
                id: request.dataset_id.clone(),
            });
        }

        let (examples, _) = self
            .store
            .get_examples(&GetExamplesQuery {
                dataset_id: request.dataset_id.clone(),
                limit: request.limit,
                offset: request.offset,
                shuffle: false,
            })
            .await?;

        let rows: Vec<Row> = examples.iter().map(example_to_row).collect();

        let writer = formats::writer_for(request.format);
        let mut buf = Vec::new();
        writer.write(&mut buf, &rows, &request.csv_options)?;

        tracing::debug!(exported = examples.len(), bytes = buf.len(), "export encoded");

        if let Some(destination) = &request.destination {
            let sink = sources::resolve_sink(destination)?;
            sink.write(Bytes::from(buf)).await?;
            return Ok(ExportResult {
                data: None,
                format: request.format,
                exported_count: examples.len(),
                destination_uri: Some(sink.uri()),
            });
        }

        Ok(ExportResult {
            data: Some(Bytes::from(buf)),
            format: request.format,
            exported_count: examples.len(),
            destination_uri: None,
        })
    }
}

/// Flattens an example into one row: `input_`/`expected_` prefixes for the
/// two field maps, `meta_` for metadata, plus `id` and `source`.
fn example_to_row(example: &Example) -> Row {
    let mut row = Row::new();
    for (key, value) in &example.input {
        row.insert(format!("input_{key}"), value.clone());
    }
    for (key, value) in &example.expected_output {
        row.insert(format!("expected_{key}"), value.clone());
    }
    for (key, value) in &example.metadata {
        row.insert(format!("meta_{key}"), Value::from(value.clone()));
    }
    row.insert("id".to_string(), Value::from(example.id.clone()));
    row.insert("source".to_string(), Value::from(example.source.as_str()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateDataset, ExampleDraft, ExampleSource};
    use crate::services::DatasetService;
    use crate::storage::MemoryStore;

    async fn seeded_store() -> (Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let service = DatasetService::new(store.clone());
        let dataset = service
            .create_dataset(CreateDataset {
                name: "arithmetic".to_string(),
                ..CreateDataset::default()
            })
            .await
            .unwrap();

        let mut input = Row::new();
        input.insert("q".to_string(), Value::from("2+2"));
        let mut expected = Row::new();
        expected.insert("a".to_string(), Value::Int(4));
        let mut metadata = std::collections::BTreeMap::new();
        metadata.insert("difficulty".to_string(), "easy".to_string());

        service
            .add_examples(
                &dataset.id,
                vec![ExampleDraft {
                    input,
                    expected_output: expected,
                    metadata,
                    source: ExampleSource::Manual,
                }],
            )
            .await
            .unwrap();

        (store, dataset.id)
    }

    fn request(dataset_id: &str, format: DataFormat) -> ExportRequest {
        ExportRequest {
            dataset_id: dataset_id.to_string(),
            format,
            destination: None,
            csv_options: CsvOptions::default(),
            limit: 0,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_export_csv_inline() {
        let (store, dataset_id) = seeded_store().await;
        let exporter = ExportService::new(store);

        let result = exporter
            .export(request(&dataset_id, DataFormat::Csv))
            .await
            .unwrap();

        assert_eq!(result.exported_count, 1);
        assert!(result.destination_uri.is_none());
        let text = String::from_utf8(result.data.unwrap().to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("expected_a,id,input_q,meta_difficulty,source")
        );
        let data_line = lines.next().unwrap();
        assert!(data_line.starts_with("4,"));
        assert!(data_line.contains("2+2"));
        assert!(data_line.ends_with(",easy,manual"));
    }

    #[tokio::test]
    async fn test_export_jsonl_projects_prefixes() {
        let (store, dataset_id) = seeded_store().await;
        let exporter = ExportService::new(store);

        let result = exporter
            .export(request(&dataset_id, DataFormat::Jsonl))
            .await
            .unwrap();

        let text = String::from_utf8(result.data.unwrap().to_vec()).unwrap();
        let row: Row = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(row["input_q"], Value::from("2+2"));
        assert_eq!(row["expected_a"], Value::Int(4));
        assert_eq!(row["meta_difficulty"], Value::from("easy"));
        assert_eq!(row["source"], Value::from("manual"));
        assert!(row.contains_key("id"));
    }

    #[tokio::test]
    async fn test_export_empty_dataset_to_parquet_is_empty_success() {
        let store = Arc::new(MemoryStore::new());
        let service = DatasetService::new(store.clone());
        let dataset = service
            .create_dataset(CreateDataset {
                name: "empty".to_string(),
                ..CreateDataset::default()
            })
            .await
            .unwrap();

        let exporter = ExportService::new(store);
        let result = exporter
            .export(request(&dataset.id, DataFormat::Parquet))
            .await
            .unwrap();

        assert_eq!(result.exported_count, 0);
        assert!(result.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_missing_dataset_fails() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let exporter = ExportService::new(store);

        let err = exporter
            .export(request("ghost", DataFormat::Csv))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_export_respects_pagination() {
        let (store, dataset_id) = seeded_store().await;
        let exporter = ExportService::new(store);

        let mut req = request(&dataset_id, DataFormat::Jsonl);
        req.offset = 5;
        let result = exporter.export(req).await.unwrap();
        assert_eq!(result.exported_count, 0);
    }
}
