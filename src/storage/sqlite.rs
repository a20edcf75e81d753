//! `SQLite` corpus store.
//!
//! Persists the four-table relational layout: `datasets` (metadata plus the
//! cached count), `dataset_tags`, `schema_fields`, and `examples` with
//! JSON-valued input/expected-output/metadata columns. Insert/delete
//! triggers on `examples` are the authoritative mechanism keeping each
//! dataset's cached `example_count` correct, and foreign keys cascade
//! dataset deletion to owned examples.

use crate::models::{
    Dataset, DatasetSchema, Example, ExampleSource, FieldType, Row, SchemaField,
};
use crate::storage::{CorpusStore, GetExamplesQuery, ListDatasetsQuery};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire the connection lock with poison recovery.
///
/// If a previous critical section panicked, recover the connection rather
/// than cascading the failure; the connection state is still valid.
fn acquire_lock(mutex: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("sqlite mutex was poisoned, recovering");
            poisoned.into_inner()
        },
    }
}

/// Escapes SQL LIKE wildcards in a string.
///
/// `%` and `_` must be treated literally when they appear in user search
/// input. Uses `\` as the escape character (requires `ESCAPE '\'` in the
/// LIKE clause).
fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// `SQLite`-backed implementation of [`CorpusStore`].
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database file (`None` for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn =
            Connection::open(&db_path).map_err(|e| Error::op("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::op("open_sqlite_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path, if file-backed.
    #[must_use]
    pub fn db_path(&self) -> Option<&std::path::Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema and counter triggers.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| Error::op("enable_foreign_keys", e))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS datasets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                prompt_id TEXT,
                example_count INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_by TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                last_updated INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dataset_tags (
                dataset_id TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                tag TEXT NOT NULL,
                PRIMARY KEY (dataset_id, tag)
            );

            CREATE TABLE IF NOT EXISTS schema_fields (
                dataset_id TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                side TEXT NOT NULL CHECK (side IN ('input', 'output')),
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                field_type TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                required INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (dataset_id, side, position)
            );

            CREATE TABLE IF NOT EXISTS examples (
                id TEXT PRIMARY KEY,
                dataset_id TEXT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                input TEXT NOT NULL,
                expected_output TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                source TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_examples_dataset ON examples(dataset_id);
            CREATE INDEX IF NOT EXISTS idx_datasets_prompt ON datasets(prompt_id);
            CREATE INDEX IF NOT EXISTS idx_datasets_created_at ON datasets(created_at DESC);

            CREATE TRIGGER IF NOT EXISTS examples_count_insert
            AFTER INSERT ON examples
            BEGIN
                UPDATE datasets
                SET example_count = example_count + 1
                WHERE id = NEW.dataset_id;
            END;

            CREATE TRIGGER IF NOT EXISTS examples_count_delete
            AFTER DELETE ON examples
            BEGIN
                UPDATE datasets
                SET example_count = MAX(example_count - 1, 0)
                WHERE id = OLD.dataset_id;
            END;",
        )
        .map_err(|e| Error::op("initialize_schema", e))?;

        Ok(())
    }

    fn insert_tags_and_fields(tx: &rusqlite::Transaction<'_>, dataset: &Dataset) -> Result<()> {
        for tag in &dataset.tags {
            tx.execute(
                "INSERT OR IGNORE INTO dataset_tags (dataset_id, tag) VALUES (?1, ?2)",
                params![dataset.id, tag],
            )
            .map_err(|e| Error::op("insert_dataset_tag", e))?;
        }

        let sides = [
            ("input", &dataset.schema.input_fields),
            ("output", &dataset.schema.expected_output_fields),
        ];
        for (side, fields) in sides {
            for (position, field) in fields.iter().enumerate() {
                tx.execute(
                    "INSERT INTO schema_fields
                     (dataset_id, side, position, name, field_type, description, required)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        dataset.id,
                        side,
                        position as i64,
                        field.name,
                        field.field_type.as_str(),
                        field.description,
                        field.required,
                    ],
                )
                .map_err(|e| Error::op("insert_schema_field", e))?;
            }
        }
        Ok(())
    }

    fn load_dataset(conn: &Connection, id: &str) -> Result<Option<Dataset>> {
        let row = conn
            .query_row(
                "SELECT id, name, description, prompt_id, example_count, version,
                        metadata, created_by, created_at, last_updated
                 FROM datasets WHERE id = ?1",
                params![id],
                dataset_from_row,
            )
            .optional()
            .map_err(|e| Error::op("get_dataset", e))?;

        let Some(mut dataset) = row else {
            return Ok(None);
        };

        dataset.tags = Self::load_tags(conn, id)?;
        dataset.schema = Self::load_schema(conn, id)?;
        Ok(Some(dataset))
    }

    fn load_tags(conn: &Connection, dataset_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT tag FROM dataset_tags WHERE dataset_id = ?1 ORDER BY tag")
            .map_err(|e| Error::op("load_tags", e))?;
        let tags = stmt
            .query_map(params![dataset_id], |row| row.get(0))
            .map_err(|e| Error::op("load_tags", e))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| Error::op("load_tags", e))?;
        Ok(tags)
    }

    fn load_schema(conn: &Connection, dataset_id: &str) -> Result<DatasetSchema> {
        let mut stmt = conn
            .prepare(
                "SELECT side, name, field_type, description, required
                 FROM schema_fields WHERE dataset_id = ?1
                 ORDER BY side, position",
            )
            .map_err(|e| Error::op("load_schema", e))?;

        let mut schema = DatasetSchema::default();
        let rows = stmt
            .query_map(params![dataset_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })
            .map_err(|e| Error::op("load_schema", e))?;

        for row in rows {
            let (side, name, field_type, description, required) =
                row.map_err(|e| Error::op("load_schema", e))?;
            let field = SchemaField {
                name,
                field_type: FieldType::parse(&field_type).unwrap_or(FieldType::String),
                description,
                required,
            };
            if side == "input" {
                schema.input_fields.push(field);
            } else {
                schema.expected_output_fields.push(field);
            }
        }
        Ok(schema)
    }

    fn dataset_exists(conn: &Connection, id: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM datasets WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::op("dataset_exists", e))?;
        Ok(found.is_some())
    }
}

fn dataset_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Dataset> {
    let metadata_json: String = row.get(6)?;
    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_json).unwrap_or_default();

    Ok(Dataset {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        prompt_id: row.get(3)?,
        example_count: usize::try_from(row.get::<_, i64>(4)?).unwrap_or(0),
        version: u64::try_from(row.get::<_, i64>(5)?).unwrap_or(1),
        metadata,
        created_by: row.get(7)?,
        created_at: epoch_to_datetime(row.get(8)?),
        last_updated: epoch_to_datetime(row.get(9)?),
        tags: Vec::new(),
        schema: DatasetSchema::default(),
    })
}

fn example_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Example> {
    let input_json: String = row.get(2)?;
    let output_json: String = row.get(3)?;
    let metadata_json: String = row.get(4)?;
    let source: String = row.get(5)?;

    Ok(Example {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        input: serde_json::from_str::<Row>(&input_json).unwrap_or_default(),
        expected_output: serde_json::from_str::<Row>(&output_json).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        source: ExampleSource::parse(&source),
        created_at: epoch_to_datetime(row.get(6)?),
    })
}

fn epoch_to_datetime(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn json_string<T: serde::Serialize>(value: &T, operation: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::op(operation, e))
}

#[async_trait]
impl CorpusStore for SqliteStore {
    async fn create_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::op("create_dataset", e))?;

        if Self::dataset_exists(&tx, &dataset.id)? {
            return Err(Error::AlreadyExists {
                entity: "dataset",
                id: dataset.id.clone(),
            });
        }

        tx.execute(
            "INSERT INTO datasets
             (id, name, description, prompt_id, example_count, version,
              metadata, created_by, created_at, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                dataset.id,
                dataset.name,
                dataset.description,
                dataset.prompt_id,
                0,
                i64::try_from(dataset.version).unwrap_or(1),
                json_string(&dataset.metadata, "encode_metadata")?,
                dataset.created_by,
                dataset.created_at.timestamp(),
                dataset.last_updated.timestamp(),
            ],
        )
        .map_err(|e| Error::op("create_dataset", e))?;

        Self::insert_tags_and_fields(&tx, dataset)?;
        tx.commit().map_err(|e| Error::op("create_dataset", e))
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<Dataset>> {
        let conn = acquire_lock(&self.conn);
        Self::load_dataset(&conn, id)
    }

    async fn update_dataset(&self, dataset: &Dataset) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::op("update_dataset", e))?;

        let changed = tx
            .execute(
                "UPDATE datasets SET
                     name = ?2, description = ?3, prompt_id = ?4, version = ?5,
                     metadata = ?6, last_updated = ?7
                 WHERE id = ?1",
                params![
                    dataset.id,
                    dataset.name,
                    dataset.description,
                    dataset.prompt_id,
                    i64::try_from(dataset.version).unwrap_or(1),
                    json_string(&dataset.metadata, "encode_metadata")?,
                    dataset.last_updated.timestamp(),
                ],
            )
            .map_err(|e| Error::op("update_dataset", e))?;

        if changed == 0 {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset.id.clone(),
            });
        }

        // Replace tags and schema wholesale; they are part of the mutable
        // metadata surface.
        tx.execute(
            "DELETE FROM dataset_tags WHERE dataset_id = ?1",
            params![dataset.id],
        )
        .map_err(|e| Error::op("update_dataset", e))?;
        tx.execute(
            "DELETE FROM schema_fields WHERE dataset_id = ?1",
            params![dataset.id],
        )
        .map_err(|e| Error::op("update_dataset", e))?;
        Self::insert_tags_and_fields(&tx, dataset)?;

        tx.commit().map_err(|e| Error::op("update_dataset", e))
    }

    async fn delete_dataset(&self, id: &str) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // Foreign keys cascade to examples, tags, and schema fields.
        let changed = conn
            .execute("DELETE FROM datasets WHERE id = ?1", params![id])
            .map_err(|e| Error::op("delete_dataset", e))?;

        if changed == 0 {
            return Err(Error::NotFound {
                entity: "dataset",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_datasets(&self, query: &ListDatasetsQuery) -> Result<(Vec<Dataset>, usize)> {
        let conn = acquire_lock(&self.conn);

        let mut conditions: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(prompt_id) = &query.prompt_id {
            args.push(Box::new(prompt_id.clone()));
            conditions.push(format!("prompt_id = ?{}", args.len()));
        }

        if let Some(search) = &query.search {
            let pattern = format!("%{}%", escape_like_wildcards(&search.to_lowercase()));
            args.push(Box::new(pattern));
            let n = args.len();
            conditions.push(format!(
                "(LOWER(name) LIKE ?{n} ESCAPE '\\' OR LOWER(description) LIKE ?{n} ESCAPE '\\')"
            ));
        }

        if !query.tags.is_empty() {
            let placeholders: Vec<String> = query
                .tags
                .iter()
                .map(|tag| {
                    args.push(Box::new(tag.clone()));
                    format!("?{}", args.len())
                })
                .collect();
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM dataset_tags t
                         WHERE t.dataset_id = datasets.id AND t.tag IN ({}))",
                placeholders.join(", ")
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|arg| &**arg).collect();

        let total: usize = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM datasets{where_clause}"),
                param_refs.as_slice(),
                |row| row.get::<_, i64>(0),
            )
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::op("count_datasets", e))?;

        let limit = if query.limit == 0 {
            -1
        } else {
            i64::try_from(query.limit).unwrap_or(-1)
        };
        let offset = i64::try_from(query.offset).unwrap_or(0);

        let sql = format!(
            "SELECT id FROM datasets{where_clause}
             ORDER BY created_at DESC, id
             LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::op("list_datasets", e))?;
        let ids = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| Error::op("list_datasets", e))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|e| Error::op("list_datasets", e))?;

        let mut datasets = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(dataset) = Self::load_dataset(&conn, &id)? {
                datasets.push(dataset);
            }
        }

        Ok((datasets, total))
    }

    async fn add_examples(&self, dataset_id: &str, examples: &[Example]) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::op("add_examples", e))?;

        if !Self::dataset_exists(&tx, dataset_id)? {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset_id.to_string(),
            });
        }

        for example in examples {
            tx.execute(
                "INSERT INTO examples
                 (id, dataset_id, input, expected_output, metadata, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    example.id,
                    dataset_id,
                    json_string(&example.input, "encode_example_input")?,
                    json_string(&example.expected_output, "encode_example_output")?,
                    json_string(&example.metadata, "encode_example_metadata")?,
                    example.source.as_str(),
                    example.created_at.timestamp(),
                ],
            )
            .map_err(|e| Error::op("add_examples", e))?;
        }

        tx.execute(
            "UPDATE datasets SET last_updated = ?2 WHERE id = ?1",
            params![dataset_id, Utc::now().timestamp()],
        )
        .map_err(|e| Error::op("add_examples", e))?;

        tx.commit().map_err(|e| Error::op("add_examples", e))
    }

    async fn get_examples(&self, query: &GetExamplesQuery) -> Result<(Vec<Example>, usize)> {
        let conn = acquire_lock(&self.conn);

        let total: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM examples WHERE dataset_id = ?1",
                params![query.dataset_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::op("count_examples", e))?;

        let order = if query.shuffle {
            "RANDOM()"
        } else {
            "rowid"
        };
        let limit = if query.limit == 0 {
            -1
        } else {
            i64::try_from(query.limit).unwrap_or(-1)
        };
        let offset = i64::try_from(query.offset).unwrap_or(0);

        let sql = format!(
            "SELECT id, dataset_id, input, expected_output, metadata, source, created_at
             FROM examples WHERE dataset_id = ?1
             ORDER BY {order}
             LIMIT {limit} OFFSET {offset}"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::op("get_examples", e))?;
        let examples = stmt
            .query_map(params![query.dataset_id], example_from_row)
            .map_err(|e| Error::op("get_examples", e))?
            .collect::<rusqlite::Result<Vec<Example>>>()
            .map_err(|e| Error::op("get_examples", e))?;

        Ok((examples, total))
    }

    async fn remove_examples(&self, dataset_id: &str, example_ids: &[String]) -> Result<usize> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::op("remove_examples", e))?;

        if !Self::dataset_exists(&tx, dataset_id)? {
            return Err(Error::NotFound {
                entity: "dataset",
                id: dataset_id.to_string(),
            });
        }

        let mut removed = 0usize;
        for example_id in example_ids {
            removed += tx
                .execute(
                    "DELETE FROM examples WHERE dataset_id = ?1 AND id = ?2",
                    params![dataset_id, example_id],
                )
                .map_err(|e| Error::op("remove_examples", e))?;
        }

        tx.execute(
            "UPDATE datasets SET last_updated = ?2 WHERE id = ?1",
            params![dataset_id, Utc::now().timestamp()],
        )
        .map_err(|e| Error::op("remove_examples", e))?;

        tx.commit().map_err(|e| Error::op("remove_examples", e))?;
        Ok(removed)
    }

    async fn get_example(&self, id: &str) -> Result<Option<Example>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT id, dataset_id, input, expected_output, metadata, source, created_at
             FROM examples WHERE id = ?1",
            params![id],
            example_from_row,
        )
        .optional()
        .map_err(|e| Error::op("get_example", e))
    }
}
