//! JSONL and JSON-array codecs.

use crate::io::formats::{RowParser, RowStream, RowWriter};
use crate::io::CsvOptions;
use crate::models::Row;
use crate::{Error, Result};
use std::io::{BufRead, BufReader, Read, Write};

/// Newline-delimited JSON parser.
///
/// Each non-empty line decodes independently as one JSON object. A single
/// malformed line is a terminal parse error carrying its 1-based line
/// number. Lines are read unbounded, so objects of 10 MiB and beyond work.
pub struct JsonlParser;

impl RowParser for JsonlParser {
    fn parse(&self, reader: Box<dyn Read + Send>, _opts: &CsvOptions) -> RowStream {
        RowStream::spawn(move |emitter| {
            let mut buf_reader = BufReader::with_capacity(64 * 1024, reader);
            let mut line = String::new();
            let mut line_num = 0usize;

            loop {
                line.clear();
                let bytes_read = buf_reader
                    .read_line(&mut line)
                    .map_err(|e| Error::op("read_jsonl", e))?;
                if bytes_read == 0 {
                    return Ok(());
                }
                line_num += 1;

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let row: Row = serde_json::from_str(trimmed).map_err(|e| Error::Decode {
                    row: line_num,
                    cause: e.to_string(),
                })?;

                if !emitter.emit(row) {
                    return Ok(());
                }
            }
        })
    }
}

/// Newline-delimited JSON writer, one object per line.
pub struct JsonlWriter;

impl RowWriter for JsonlWriter {
    fn write(&self, out: &mut dyn Write, rows: &[Row], _opts: &CsvOptions) -> Result<()> {
        for row in rows {
            serde_json::to_writer(&mut *out, row).map_err(|e| Error::op("write_jsonl", e))?;
            out.write_all(b"\n").map_err(|e| Error::op("write_jsonl", e))?;
        }
        Ok(())
    }
}

/// JSON-array parser.
///
/// The entire byte stream decodes as one array of objects; decoding is
/// all-or-nothing, there is no partial success.
pub struct JsonArrayParser;

impl RowParser for JsonArrayParser {
    fn parse(&self, reader: Box<dyn Read + Send>, _opts: &CsvOptions) -> RowStream {
        RowStream::spawn(move |emitter| {
            let buf_reader = BufReader::new(reader);
            let rows: Vec<Row> = serde_json::from_reader(buf_reader)
                .map_err(|e| Error::op("parse_json_array", e))?;

            for row in rows {
                if !emitter.emit(row) {
                    return Ok(());
                }
            }
            Ok(())
        })
    }
}

/// JSON-array writer, indented for readability.
pub struct JsonArrayWriter;

impl RowWriter for JsonArrayWriter {
    fn write(&self, out: &mut dyn Write, rows: &[Row], _opts: &CsvOptions) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, rows).map_err(|e| Error::op("write_json", e))?;
        out.write_all(b"\n").map_err(|e| Error::op("write_json", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use std::io::Cursor;

    async fn collect(
        parser: &dyn RowParser,
        input: String,
    ) -> (Vec<Row>, Result<()>) {
        let mut stream = parser.parse(Box::new(Cursor::new(input)), &CsvOptions::default());
        let mut rows = Vec::new();
        while let Some(row) = stream.next_row().await {
            rows.push(row);
        }
        (rows, stream.finish().await)
    }

    #[tokio::test]
    async fn test_jsonl_parse_skips_blank_lines() {
        let input = "{\"a\": 1}\n\n{\"a\": 2, \"nested\": {\"x\": true}}\n";
        let (rows, end) = collect(&JsonlParser, input.to_string()).await;
        end.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], Value::Int(1));
        let Value::Map(nested) = &rows[1]["nested"] else {
            panic!("expected nested map");
        };
        assert_eq!(nested["x"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_jsonl_malformed_line_reports_line_number() {
        let input = "{\"a\": 1}\n{not json}\n{\"a\": 3}\n";
        let (rows, end) = collect(&JsonlParser, input.to_string()).await;

        assert_eq!(rows.len(), 1);
        let err = end.unwrap_err();
        assert!(matches!(err, Error::Decode { row: 2, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_jsonl_large_line() {
        let big = "x".repeat(10 * 1024 * 1024);
        let input = format!("{{\"blob\": \"{big}\"}}\n");
        let (rows, end) = collect(&JsonlParser, input).await;
        end.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["blob"].as_str().map(str::len), Some(big.len()));
    }

    #[tokio::test]
    async fn test_json_array_parse() {
        let input = r#"[{"q": "2+2", "a": 4}, {"q": "3+3", "a": 6}]"#;
        let (rows, end) = collect(&JsonArrayParser, input.to_string()).await;
        end.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], Value::Int(6));
    }

    #[tokio::test]
    async fn test_json_array_is_all_or_nothing() {
        let input = r#"[{"q": "ok"}, {"q": broken]"#;
        let (rows, end) = collect(&JsonArrayParser, input.to_string()).await;

        assert!(rows.is_empty());
        assert!(end.is_err());
    }

    #[tokio::test]
    async fn test_jsonl_round_trip() {
        let mut row = Row::new();
        row.insert("n".to_string(), Value::Int(1));
        row.insert(
            "tags".to_string(),
            Value::List(vec![Value::from("x"), Value::from("y")]),
        );

        let mut out = Vec::new();
        JsonlWriter
            .write(&mut out, std::slice::from_ref(&row), &CsvOptions::default())
            .unwrap();

        let (rows, end) = collect(&JsonlParser, String::from_utf8(out).unwrap()).await;
        end.unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_json_array_writer_emits_array() {
        let mut row = Row::new();
        row.insert("a".to_string(), Value::Int(1));

        let mut out = Vec::new();
        JsonArrayWriter
            .write(&mut out, &[row], &CsvOptions::default())
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.trim_start().starts_with('['));
        assert!(text.contains("\"a\": 1"));
    }
}
