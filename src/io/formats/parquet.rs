//! Apache Parquet columnar codec.
//!
//! The underlying reader needs random access, so the parser buffers the
//! entire byte stream before yielding the first row. This is the only
//! format that materializes fully; the other codecs stream.

use crate::io::formats::{RowParser, RowStream, RowWriter};
use crate::io::CsvOptions;
use crate::models::{Row, Value};
use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, StringArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Rows per record batch when reading back the buffered file.
const READ_BATCH_SIZE: usize = 100;

/// Parquet parser.
pub struct ParquetParser;

impl RowParser for ParquetParser {
    fn parse(&self, mut reader: Box<dyn Read + Send>, _opts: &CsvOptions) -> RowStream {
        RowStream::spawn(move |emitter| {
            let mut data = Vec::new();
            reader
                .read_to_end(&mut data)
                .map_err(|e| Error::op("read_parquet", e))?;

            let batch_reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
                .map_err(|e| Error::op("open_parquet", e))?
                .with_batch_size(READ_BATCH_SIZE)
                .build()
                .map_err(|e| Error::op("open_parquet", e))?;

            for batch in batch_reader {
                let batch = batch.map_err(|e| Error::op("read_parquet_batch", e))?;
                let schema = batch.schema();

                for row_idx in 0..batch.num_rows() {
                    let mut row = Row::new();
                    for (col_idx, field) in schema.fields().iter().enumerate() {
                        let value = cell_value(batch.column(col_idx), row_idx, field.name())?;
                        row.insert(field.name().clone(), value);
                    }
                    if !emitter.emit(row) {
                        return Ok(());
                    }
                }
            }
            Ok(())
        })
    }
}

/// Reads one cell out of an Arrow column.
fn cell_value(array: &ArrayRef, idx: usize, column: &str) -> Result<Value> {
    if array.is_null(idx) {
        return Ok(Value::Null);
    }

    macro_rules! scalar {
        ($array_ty:ty, $wrap:expr) => {{
            let typed = array.as_any().downcast_ref::<$array_ty>().ok_or_else(|| {
                Error::op("read_parquet", format!("column '{column}' type mismatch"))
            })?;
            let raw = typed.value(idx);
            Ok($wrap(raw))
        }};
    }

    match array.data_type() {
        DataType::Boolean => scalar!(BooleanArray, Value::Bool),
        DataType::Int8 => scalar!(Int8Array, |v| Value::Int(i64::from(v))),
        DataType::Int16 => scalar!(Int16Array, |v| Value::Int(i64::from(v))),
        DataType::Int32 => scalar!(Int32Array, |v| Value::Int(i64::from(v))),
        DataType::Int64 => scalar!(Int64Array, Value::Int),
        DataType::UInt8 => scalar!(UInt8Array, |v| Value::Int(i64::from(v))),
        DataType::UInt16 => scalar!(UInt16Array, |v| Value::Int(i64::from(v))),
        DataType::UInt32 => scalar!(UInt32Array, |v| Value::Int(i64::from(v))),
        DataType::UInt64 => scalar!(UInt64Array, |v: u64| i64::try_from(v)
            .map_or_else(|_| Value::Float(v as f64), Value::Int)),
        DataType::Float32 => scalar!(Float32Array, |v| Value::Float(f64::from(v))),
        DataType::Float64 => scalar!(Float64Array, Value::Float),
        DataType::Utf8 => scalar!(StringArray, |v: &str| Value::String(v.to_string())),
        DataType::LargeUtf8 => scalar!(LargeStringArray, |v: &str| Value::String(v.to_string())),
        other => Err(Error::op(
            "read_parquet",
            format!("unsupported column type for '{column}': {other}"),
        )),
    }
}

/// Column type chosen for a key when planning the write schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int(_) => Some(Self::Int),
            Value::Float(_) => Some(Self::Float),
            Value::Bool(_) => Some(Self::Bool),
            Value::String(_) | Value::List(_) | Value::Map(_) => Some(Self::Text),
        }
    }

    /// Merges two observed kinds. Mixed integers and floats widen to float;
    /// any other mix degrades to text.
    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Text,
        }
    }

    const fn data_type(self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Text => DataType::Utf8,
        }
    }
}

/// Parquet writer.
///
/// Writing zero rows is a no-op producing no bytes, not a zero-length
/// parquet file.
pub struct ParquetWriter;

impl RowWriter for ParquetWriter {
    fn write(&self, out: &mut dyn Write, rows: &[Row], _opts: &CsvOptions) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Column plan: union of keys, widest observed kind per key.
        let mut kinds: BTreeMap<&str, Option<ColumnKind>> = BTreeMap::new();
        for row in rows {
            for (key, value) in row {
                let entry = kinds.entry(key.as_str()).or_insert(None);
                if let Some(kind) = ColumnKind::of(value) {
                    *entry = Some(entry.map_or(kind, |k| k.merge(kind)));
                }
            }
        }

        let mut fields = Vec::with_capacity(kinds.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(kinds.len());
        for (key, kind) in kinds {
            // All-null columns carry no kind evidence; store them as text.
            let kind = kind.unwrap_or(ColumnKind::Text);
            fields.push(Field::new(key, kind.data_type(), true));
            columns.push(column_array(rows, key, kind));
        }

        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), columns)
            .map_err(|e| Error::op("build_parquet_batch", e))?;

        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        // ArrowWriter needs an owned writer, so encode into a buffer first.
        let mut buf = Vec::new();
        let mut arrow_writer = ArrowWriter::try_new(&mut buf, schema, Some(props))
            .map_err(|e| Error::op("open_parquet_writer", e))?;
        arrow_writer
            .write(&batch)
            .map_err(|e| Error::op("write_parquet", e))?;
        arrow_writer
            .close()
            .map_err(|e| Error::op("close_parquet_writer", e))?;

        out.write_all(&buf).map_err(|e| Error::op("write_parquet", e))?;
        Ok(())
    }
}

/// Builds the Arrow array for one planned column.
fn column_array(rows: &[Row], key: &str, kind: ColumnKind) -> ArrayRef {
    match kind {
        ColumnKind::Int => {
            let values: Int64Array = rows
                .iter()
                .map(|row| match row.get(key) {
                    Some(Value::Int(i)) => Some(*i),
                    _ => None,
                })
                .collect();
            Arc::new(values)
        },
        ColumnKind::Float => {
            let values: Float64Array = rows
                .iter()
                .map(|row| match row.get(key) {
                    Some(Value::Float(f)) => Some(*f),
                    #[allow(clippy::cast_precision_loss)]
                    Some(Value::Int(i)) => Some(*i as f64),
                    _ => None,
                })
                .collect();
            Arc::new(values)
        },
        ColumnKind::Bool => {
            let values: BooleanArray = rows
                .iter()
                .map(|row| match row.get(key) {
                    Some(Value::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect();
            Arc::new(values)
        },
        ColumnKind::Text => {
            let values: StringArray = rows
                .iter()
                .map(|row| match row.get(key) {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(value.render_cell()),
                })
                .collect();
            Arc::new(values)
        },
    }
}
