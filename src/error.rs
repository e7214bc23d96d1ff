use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiffCovError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    /// The patch text could not be split into well-formed hunks.
    #[error("malformed patch at line {line}: {message}")]
    PatchFormat { line: usize, message: String },

    /// The coverage dataset could not be loaded at all.
    #[error("coverage data unavailable at {}: {reason}", path.display())]
    CoverageBackendUnavailable { path: PathBuf, reason: String },

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid settings file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("{0}")]
    Other(String),
}

impl DiffCovError {
    pub(crate) fn patch(line: usize, message: impl Into<String>) -> Self {
        DiffCovError::PatchFormat {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DiffCovError::CoverageBackendUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiffCovError>;
