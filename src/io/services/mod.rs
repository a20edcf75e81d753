//! Import and export orchestration.
//!
//! Composes source → codec → column mapping/validation → store (import) and
//! store → projection → codec → destination (export).

pub mod export;
pub mod import;

pub use export::{ExportRequest, ExportResult, ExportService};
pub use import::{ImportError, ImportRequest, ImportResult, ImportService};
