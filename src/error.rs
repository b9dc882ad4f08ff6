//! Error types for loading and querying a dataset.
//!
//! Loading problems surface as [`LoadError`]; problems with a selection or a
//! query against an already-loaded dataset surface as [`QueryError`]. Neither
//! is fatal: callers are expected to show the message and withhold results.
//! [`ExportError`] covers writing the selected rows out, and [`RenderError`]
//! turning aggregate tables into text or JSON.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a source file into a dataset.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid JSON layout: {0}")]
    JsonLayout(String),

    #[error("required column '{0}' not found")]
    MissingColumn(String),

    #[error("no factor columns matching prefix '{0}'")]
    NoFactorColumns(String),

    #[error("file contains no header row")]
    EmptyInput,
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<calamine::Error> for LoadError {
    fn from(err: calamine::Error) -> Self {
        LoadError::Spreadsheet(err.to_string())
    }
}

/// Failure to write the selected rows to a file.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("cannot write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure to answer a query over a loaded dataset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The selection matched no rows. Distinct from a result whose values are zero.
    #[error("no rows match the current selection")]
    EmptySelection,

    #[error("unknown factor '{0}'")]
    UnknownFactor(String),

    #[error("unknown measure '{0}'")]
    UnknownMeasure(String),

    #[error("no dataset loaded")]
    NoDataLoaded,
}

/// Failure to render a result as a table or as JSON.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("table rendering failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
