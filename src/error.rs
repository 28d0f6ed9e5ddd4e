//! Typed errors surfaced by the analysis core.
//!
//! Structural problems (unknown extension, oversized upload, unreadable
//! workbook) are fatal for a whole parse. Per-value and per-row anomalies are
//! never represented here; they are recovered where they occur.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unsupported file format '{extension}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat { extension: String },
    #[error("File contains no columns to analyze")]
    EmptyOrUnparseableFile,
    #[error("File is {size} bytes which exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),
    #[error("No stored blob for handle '{handle}'")]
    BlobNotFound { handle: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
