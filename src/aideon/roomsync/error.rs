use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::aideon::roomsync::model::{Field, Source};

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the fatal failure cases of an analysis run.
///
/// Unmatched rooms, unparseable numeric cells and assisted-detection outages
/// are not errors; they surface as warnings and metrics instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error in {side} workbook: {source}")]
    ExcelRead {
        side: Source,
        #[source]
        source: calamine::Error,
    },

    /// Raised when the input bytes are not a recognised spreadsheet encoding.
    #[error("{side} input is not a supported spreadsheet (expected .xls, .xlsx, .xlsm or .xlsb)")]
    UnsupportedFormat { side: Source },

    /// Raised when no header row could be determined for a sheet.
    #[error("structure detection failed for {side} sheet: {source}")]
    StructureDetection {
        side: Source,
        #[source]
        source: DetectionError,
    },

    /// Raised when a sheet yields no room records.
    #[error("{side} sheet contains no room rows")]
    EmptyInput { side: Source },

    /// Raised when the caller aborted the run between two stages.
    #[error("analysis cancelled before {stage}")]
    Cancelled { stage: String },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Reasons the structure detector gives up on a sheet.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("sheet has no rows")]
    EmptySheet,

    #[error("no header row reached the minimum confidence (best was row {row} with {score:.2})")]
    NoHeaderRow { row: usize, score: f64 },

    #[error("header row {row} is outside the sheet ({rows} rows)")]
    HintOutOfRange { row: usize, rows: usize },

    #[error("header row {row} has no {field} column")]
    MissingColumn { field: Field, row: usize },
}

/// Failures of an assisted-detection strategy. Always recovered from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssistError {
    #[error("assisted detection unavailable: {0}")]
    Unavailable(String),

    #[error("assisted detection timed out after {0:?}")]
    TimedOut(Duration),

    #[error("assisted detection returned an unusable answer: {0}")]
    InvalidAnswer(String),

    #[error("assisted detection failed: {0}")]
    Failed(String),
}
