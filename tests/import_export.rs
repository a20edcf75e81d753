//! End-to-end import/export flows against the sqlite backend.

use exemplar::{
    ColumnMapping, CreateDataset, CsvOptions, DataFormat, DataSource, DatasetService,
    ExportRequest, ExportService, FieldType, GetExamplesQuery, ImportRequest, ImportService,
    SchemaField, Value,
};
use exemplar::storage::SqliteStore;
use std::io::Write;
use std::sync::Arc;

fn qa_mappings() -> Vec<ColumnMapping> {
    vec![
        ColumnMapping {
            source_column: "q".to_string(),
            target_field: "q".to_string(),
            is_input: true,
        },
        ColumnMapping {
            source_column: "a".to_string(),
            target_field: "a".to_string(),
            is_input: false,
        },
    ]
}

fn import_request(dataset_id: &str, source: DataSource, format: DataFormat) -> ImportRequest {
    ImportRequest {
        dataset_id: dataset_id.to_string(),
        source,
        format,
        column_mappings: qa_mappings(),
        csv_options: CsvOptions::default(),
        skip_invalid: true,
        max_rows: 0,
    }
}

fn export_request(dataset_id: &str, format: DataFormat) -> ExportRequest {
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
async fn csv_file_import_to_sqlite_then_jsonl_export() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let service = DatasetService::new(store.clone());

    let dataset = service
        .create_dataset(CreateDataset {
            name: "arithmetic".to_string(),
            description: "smoke corpus".to_string(),
            tags: vec!["math".to_string()],
            ..CreateDataset::default()
        })
        .await
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"q,a\n2+2,4\n3+3,6\n10/2,5\n").unwrap();

    let importer = ImportService::new(store.clone());
    let result = importer
        .import(import_request(
            &dataset.id,
            DataSource::LocalFile {
                path: file.path().to_path_buf(),
            },
            DataFormat::Csv,
        ))
        .await
        .unwrap();

    assert_eq!(result.imported_count, 3);
    assert_eq!(result.error_count, 0);

    let reloaded = service.get_dataset(&dataset.id).await.unwrap().unwrap();
    assert_eq!(reloaded.example_count, 3);

    let exporter = ExportService::new(store);
    let exported = exporter
        .export(export_request(&dataset.id, DataFormat::Jsonl))
        .await
        .unwrap();

    assert_eq!(exported.exported_count, 3);
    let text = String::from_utf8(exported.data.unwrap().to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("\"input_q\":\"2+2\""));
    assert!(lines[0].contains("\"expected_a\":4"));
    assert!(lines[0].contains("\"source\":\"imported\""));
}

#[tokio::test]
async fn exported_parquet_reimports_with_equivalent_values() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let service = DatasetService::new(store.clone());
    let importer = ImportService::new(store.clone());
    let exporter = ExportService::new(store.clone());

    let first = service
        .create_dataset(CreateDataset {
            name: "origin".to_string(),
            ..CreateDataset::default()
        })
        .await
        .unwrap();

    importer
        .import(import_request(
            &first.id,
            DataSource::Inline {
                data: bytes::Bytes::from_static(b"q,a\n2+2,4\n3+3,6\n"),
            },
            DataFormat::Csv,
        ))
        .await
        .unwrap();

    let exported = exporter
        .export(export_request(&first.id, DataFormat::Parquet))
        .await
        .unwrap();
    let parquet_bytes = exported.data.unwrap();
    assert_eq!(&parquet_bytes[0..4], b"PAR1");

    let second = service
        .create_dataset(CreateDataset {
            name: "round-trip".to_string(),
            ..CreateDataset::default()
        })
        .await
        .unwrap();

    let mut request = import_request(
        &second.id,
        DataSource::Inline {
            data: parquet_bytes,
        },
        DataFormat::Parquet,
    );
    request.column_mappings = vec![
        ColumnMapping {
            source_column: "input_q".to_string(),
            target_field: "q".to_string(),
            is_input: true,
        },
        ColumnMapping {
            source_column: "expected_a".to_string(),
            target_field: "a".to_string(),
            is_input: false,
        },
    ];
    let result = importer.import(request).await.unwrap();
    assert_eq!(result.imported_count, 2);

    let (examples, total) = service
        .get_examples(&GetExamplesQuery {
            dataset_id: second.id.clone(),
            ..GetExamplesQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    let answers: Vec<&Value> = examples.iter().map(|e| &e.expected_output["a"]).collect();
    assert!(answers.contains(&&Value::Int(4)));
    assert!(answers.contains(&&Value::Int(6)));
}

#[tokio::test]
async fn schema_validation_rejects_rows_without_aborting_batch() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let service = DatasetService::new(store.clone());

    let mut create = CreateDataset {
        name: "validated".to_string(),
        ..CreateDataset::default()
    };
    create.schema.input_fields.push(SchemaField {
        name: "q".to_string(),
        field_type: FieldType::String,
        description: String::new(),
        required: true,
    });
    create.schema.expected_output_fields.push(SchemaField {
        name: "a".to_string(),
        field_type: FieldType::Number,
        description: String::new(),
        required: true,
    });
    let dataset = service.create_dataset(create).await.unwrap();

    let importer = ImportService::new(store.clone());
    let jsonl = "{\"q\": \"2+2\", \"a\": 4}\n{\"q\": \"no answer\"}\n{\"a\": 9}\n{\"q\": \"3+3\", \"a\": 6}\n";
    let result = importer
        .import(import_request(
            &dataset.id,
            DataSource::Inline {
                data: bytes::Bytes::from(jsonl),
            },
            DataFormat::Jsonl,
        ))
        .await
        .unwrap();

    assert_eq!(result.imported_count, 2);
    assert_eq!(result.skipped_count, 2);
    assert_eq!(result.error_count, 2);
    assert_eq!(result.errors[0].row_number, 2);
    assert_eq!(result.errors[1].row_number, 3);

    let reloaded = service.get_dataset(&dataset.id).await.unwrap().unwrap();
    assert_eq!(reloaded.example_count, 2);
}

#[tokio::test]
async fn gcs_import_fails_fast() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let service = DatasetService::new(store.clone());
    let dataset = service
        .create_dataset(CreateDataset::default())
        .await
        .unwrap();

    let importer = ImportService::new(store);
    let err = importer
        .import(import_request(
            &dataset.id,
            DataSource::Gcs {
                bucket: "b".to_string(),
                object: "o".to_string(),
                project_id: "p".to_string(),
            },
            DataFormat::Csv,
        ))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not implemented"), "{err}");
}
