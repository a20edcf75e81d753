//! Delimited-text codec.
//!
//! Values are inferred in a strict order (integer, float, boolean, string)
//! so `"0"` stays an integer and `"true"` becomes a boolean only after both
//! numeric parses fail.

use crate::io::formats::{RowParser, RowStream, RowWriter};
use crate::io::CsvOptions;
use crate::models::{Row, Value};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Delimited-text parser.
///
/// With `has_header` set the first record names the fields; without it,
/// fields are named `col0`, `col1`, ... by position. Records whose field
/// count differs from the first record's are a terminal parse error carrying
/// the 1-based data-row number.
pub struct CsvParser;

impl RowParser for CsvParser {
    fn parse(&self, reader: Box<dyn Read + Send>, opts: &CsvOptions) -> RowStream {
        let opts = opts.clone();

        RowStream::spawn(move |emitter| {
            let mut csv_reader = reader_builder(&opts)?.from_reader(reader);

            let mut headers: Option<Vec<String>> = None;
            if opts.has_header {
                let mut header_record = csv::StringRecord::new();
                let has_header_record = csv_reader
                    .read_record(&mut header_record)
                    .map_err(|e| Error::op("read_csv_header", e))?;
                if !has_header_record {
                    return Ok(());
                }
                headers = Some(header_record.iter().map(String::from).collect());
            }

            let mut record = csv::StringRecord::new();
            let mut row_num = 0usize;
            loop {
                let has_record = csv_reader.read_record(&mut record).map_err(|e| Error::Decode {
                    row: row_num + 1,
                    cause: e.to_string(),
                })?;
                if !has_record {
                    return Ok(());
                }
                row_num += 1;

                let mut row = Row::new();
                for (i, field) in record.iter().enumerate() {
                    let key = headers
                        .as_ref()
                        .and_then(|h| h.get(i))
                        .cloned()
                        .unwrap_or_else(|| format!("col{i}"));
                    row.insert(key, Value::infer(field));
                }

                if !emitter.emit(row) {
                    return Ok(());
                }
            }
        })
    }
}

/// Delimited-text writer.
///
/// The header is the union of all keys across all rows, not just the first
/// row's keys; rows missing a key get an empty cell there.
pub struct CsvWriter;

impl RowWriter for CsvWriter {
    fn write(&self, out: &mut dyn Write, rows: &[Row], opts: &CsvOptions) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut headers: BTreeSet<&str> = BTreeSet::new();
        for row in rows {
            for key in row.keys() {
                headers.insert(key);
            }
        }

        let mut csv_writer = writer_builder(opts)?.from_writer(out);

        if opts.has_header {
            csv_writer
                .write_record(headers.iter())
                .map_err(|e| Error::op("write_csv_header", e))?;
        }

        for row in rows {
            let record = headers
                .iter()
                .map(|h| row.get(*h).map(Value::render_cell).unwrap_or_default());
            csv_writer
                .write_record(record)
                .map_err(|e| Error::op("write_csv", e))?;
        }

        csv_writer.flush().map_err(|e| Error::op("flush_csv", e))?;
        Ok(())
    }
}

fn reader_builder(opts: &CsvOptions) -> Result<csv::ReaderBuilder> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(CsvOptions::ascii_byte(opts.delimiter, "delimiter")?)
        .quote(CsvOptions::ascii_byte(opts.quote, "quote")?)
        .escape(Some(CsvOptions::ascii_byte(opts.escape, "escape")?))
        .has_headers(false)
        .flexible(false);
    Ok(builder)
}

fn writer_builder(opts: &CsvOptions) -> Result<csv::WriterBuilder> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(CsvOptions::ascii_byte(opts.delimiter, "delimiter")?)
        .quote(CsvOptions::ascii_byte(opts.quote, "quote")?)
        .has_headers(false);
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn collect(input: &'static str, opts: &CsvOptions) -> (Vec<Row>, Result<()>) {
        let mut stream = CsvParser.parse(Box::new(Cursor::new(input)), opts);
        let mut rows = Vec::new();
        while let Some(row) = stream.next_row().await {
            rows.push(row);
        }
        (rows, stream.finish().await)
    }

    #[tokio::test]
    async fn test_parse_with_header_and_inference() {
        let input = "question,answer,score\n2+2,4,0.5\nis water wet,true,1\n";
        let (rows, end) = collect(input, &CsvOptions::default()).await;
        end.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["question"], Value::String("2+2".to_string()));
        assert_eq!(rows[0]["answer"], Value::Int(4));
        assert_eq!(rows[0]["score"], Value::Float(0.5));
        assert_eq!(rows[1]["answer"], Value::Bool(true));
        assert_eq!(rows[1]["score"], Value::Int(1));
    }

    #[tokio::test]
    async fn test_parse_without_header_synthesizes_names() {
        let opts = CsvOptions {
            has_header: false,
            ..CsvOptions::default()
        };
        let (rows, end) = collect("a,1\nb,2\n", &opts).await;
        end.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["col0"], Value::String("a".to_string()));
        assert_eq!(rows[0]["col1"], Value::Int(1));
        assert_eq!(rows[1]["col0"], Value::String("b".to_string()));
    }

    #[tokio::test]
    async fn test_parse_custom_delimiter() {
        let opts = CsvOptions {
            delimiter: ';',
            ..CsvOptions::default()
        };
        let (rows, end) = collect("x;y\n1;2\n", &opts).await;
        end.unwrap();
        assert_eq!(rows[0]["x"], Value::Int(1));
        assert_eq!(rows[0]["y"], Value::Int(2));
    }

    #[tokio::test]
    async fn test_parse_malformed_record_is_terminal() {
        let input = "q,a\n2+2,4\n3+3,6\nbad\n";
        let (rows, end) = collect(input, &CsvOptions::default()).await;

        // Rows before the malformed record are still delivered.
        assert_eq!(rows.len(), 2);
        let err = end.unwrap_err();
        assert!(matches!(err, Error::Decode { row: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_parse_empty_input() {
        let (rows, end) = collect("", &CsvOptions::default()).await;
        end.unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_write_header_is_union_of_all_keys() {
        let mut first = Row::new();
        first.insert("a".to_string(), Value::Int(1));
        let mut second = Row::new();
        second.insert("b".to_string(), Value::Int(2));

        let mut out = Vec::new();
        CsvWriter
            .write(&mut out, &[first, second], &CsvOptions::default())
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("a,b"));
        // Missing keys become empty cells.
        assert_eq!(lines.next(), Some("1,"));
        assert_eq!(lines.next(), Some(",2"));
    }

    #[test]
    fn test_write_zero_rows_is_empty() {
        let mut out = Vec::new();
        CsvWriter.write(&mut out, &[], &CsvOptions::default()).unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_round_trip_preserves_values() {
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Int(7));
        row.insert("f".to_string(), Value::Float(2.5));
        row.insert("b".to_string(), Value::Bool(false));
        row.insert("s".to_string(), Value::String("hello, world".to_string()));

        let mut out = Vec::new();
        CsvWriter
            .write(&mut out, std::slice::from_ref(&row), &CsvOptions::default())
            .unwrap();

        let text: &'static str = String::from_utf8(out).unwrap().leak();
        let (rows, end) = collect(text, &CsvOptions::default()).await;
        end.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], row);
    }
}
