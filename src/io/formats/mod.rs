//! Format codecs.
//!
//! Each format implements [`RowParser`] and [`RowWriter`]. Parsers decode on
//! a blocking worker and deliver rows through a bounded channel; writers
//! take a finite row slice and emit bytes.

pub mod csv;
pub mod json;
pub mod parquet;

use crate::io::CsvOptions;
use crate::models::Row;
use crate::{Error, Result};
use std::io::{Read, Write};
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot};

/// Bound of the row channel between a decoding worker and its consumer.
///
/// A full channel blocks the producer, which is the backpressure mechanism
/// keeping memory flat for large inputs.
const ROW_CHANNEL_CAPACITY: usize = 100;

/// Supported external data formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// Delimited text with configurable delimiter and type inference.
    Csv,
    /// Newline-delimited JSON, one object per line.
    Jsonl,
    /// A single JSON array of objects.
    Json,
    /// Apache Parquet columnar files.
    Parquet,
}

impl DataFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" | "tsv" => Ok(Self::Csv),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "json" => Ok(Self::Json),
            "parquet" | "pq" => Ok(Self::Parquet),
            _ => Err(Error::InvalidInput(format!("unknown format: {s}"))),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Sends rows from a decoding worker to the consuming task.
pub(crate) struct RowEmitter {
    tx: mpsc::Sender<Row>,
}

impl RowEmitter {
    /// Delivers one row, blocking while the channel is full.
    ///
    /// Returns `false` when the consumer has dropped the stream; the worker
    /// must stop decoding and return.
    pub(crate) fn emit(&self, row: Row) -> bool {
        self.tx.blocking_send(row).is_ok()
    }
}

/// A lazy, finite, non-restartable sequence of rows.
///
/// Rows arrive in source order while the decoding worker is still running.
/// The channel closing does not by itself mean success: callers must drain
/// with [`RowStream::next_row`] and then call [`RowStream::finish`] to learn
/// whether the stream ended cleanly or was truncated by a terminal error.
///
/// Dropping the stream mid-parse cancels the worker: its next emit fails,
/// it returns, and the reader it owns is closed.
pub struct RowStream {
    rows: mpsc::Receiver<Row>,
    error: oneshot::Receiver<Error>,
}

impl RowStream {
    /// Runs `decode` on a blocking worker feeding a bounded row channel.
    ///
    /// An `Err` return from `decode` lands in the terminal-error slot; at
    /// most one fires per stream.
    pub(crate) fn spawn<F>(decode: F) -> Self
    where
        F: FnOnce(&RowEmitter) -> Result<()> + Send + 'static,
    {
        let (tx, rows) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let (err_tx, error) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            let emitter = RowEmitter { tx };
            if let Err(e) = decode(&emitter) {
                let _ = err_tx.send(e);
            }
        });

        Self { rows, error }
    }

    /// Receives the next row, or `None` when the stream is exhausted.
    pub async fn next_row(&mut self) -> Option<Row> {
        self.rows.recv().await
    }

    /// Consumes the stream and reports how decoding ended.
    ///
    /// Returns the terminal error if the worker failed; `Ok(())` for a clean
    /// end of input, including the case where the caller stopped consuming
    /// early.
    pub async fn finish(self) -> Result<()> {
        drop(self.rows);
        match self.error.await {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }
}

/// Decodes a byte stream into a sequence of rows.
pub trait RowParser: Send + Sync {
    /// Starts a decoding worker over `reader` and returns its row stream.
    ///
    /// The reader moves into the worker and is closed when the worker
    /// returns, on every exit path.
    fn parse(&self, reader: Box<dyn Read + Send>, opts: &CsvOptions) -> RowStream;
}

/// Encodes a finite slice of rows as bytes.
pub trait RowWriter: Send + Sync {
    /// Writes `rows` to `out` in this writer's format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or I/O fails.
    fn write(&self, out: &mut dyn Write, rows: &[Row], opts: &CsvOptions) -> Result<()>;
}

/// Returns the parser for a format.
#[must_use]
pub fn parser_for(format: DataFormat) -> Box<dyn RowParser> {
    match format {
        DataFormat::Csv => Box::new(csv::CsvParser),
        DataFormat::Jsonl => Box::new(json::JsonlParser),
        DataFormat::Json => Box::new(json::JsonArrayParser),
        DataFormat::Parquet => Box::new(parquet::ParquetParser),
    }
}

/// Returns the writer for a format.
#[must_use]
pub fn writer_for(format: DataFormat) -> Box<dyn RowWriter> {
    match format {
        DataFormat::Csv => Box::new(csv::CsvWriter),
        DataFormat::Jsonl => Box::new(json::JsonlWriter),
        DataFormat::Json => Box::new(json::JsonArrayWriter),
        DataFormat::Parquet => Box::new(parquet::ParquetWriter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!(DataFormat::from_str("csv").unwrap(), DataFormat::Csv);
        assert_eq!(DataFormat::from_str("JSONL").unwrap(), DataFormat::Jsonl);
        assert_eq!(DataFormat::from_str("ndjson").unwrap(), DataFormat::Jsonl);
        assert_eq!(DataFormat::from_str("json").unwrap(), DataFormat::Json);
        assert_eq!(DataFormat::from_str("parquet").unwrap(), DataFormat::Parquet);
        assert!(DataFormat::from_str("xml").is_err());
    }

    #[test]
    fn test_format_display() {
        assert_eq!(DataFormat::Csv.to_string(), "csv");
        assert_eq!(DataFormat::Jsonl.to_string(), "jsonl");
    }

    #[tokio::test]
    async fn test_row_stream_delivers_in_order() {
        let mut stream = RowStream::spawn(|emitter| {
            for i in 0..5i64 {
                let mut row = Row::new();
                row.insert("n".to_string(), crate::models::Value::Int(i));
                if !emitter.emit(row) {
                    return Ok(());
                }
            }
            Ok(())
        });

        let mut seen = Vec::new();
        while let Some(row) = stream.next_row().await {
            seen.push(row["n"].as_int().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        stream.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_row_stream_surfaces_terminal_error() {
        let mut stream = RowStream::spawn(|emitter| {
            let mut row = Row::new();
            row.insert("n".to_string(), crate::models::Value::Int(1));
            emitter.emit(row);
            Err(Error::Decode {
                row: 2,
                cause: "boom".to_string(),
            })
        });

        assert!(stream.next_row().await.is_some());
        assert!(stream.next_row().await.is_none());
        let err = stream.finish().await.unwrap_err();
        assert!(matches!(err, Error::Decode { row: 2, .. }));
    }

    #[tokio::test]
    async fn test_row_stream_drop_stops_worker() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let stream = RowStream::spawn(move |emitter| {
            let mut n = 0i64;
            loop {
                let mut row = Row::new();
                row.insert("n".to_string(), crate::models::Value::Int(n));
                if !emitter.emit(row) {
                    break;
                }
                n += 1;
            }
            let _ = done_tx.send(n);
            Ok(())
        });

        drop(stream);
        // The worker notices the closed channel and terminates.
        let emitted = done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert!(emitted <= 1 + ROW_CHANNEL_CAPACITY as i64);
    }
}
