//! Narrow query interface over recorded coverage data.
//!
//! The calculator only ever asks one question: which lines of this file were
//! instrumentable but never executed? [`CoverageSource`] is that question;
//! [`CoverageStore`] answers it from a SQLite store, either opened from disk
//! or built on the fly from an LCOV/Cobertura file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

use crate::db;
use crate::detect::{detect_format, Format};
use crate::error::{DiffCovError, Result};
use crate::parsers::parse_with_format;

/// A file the coverage data cannot answer for. Never fatal: the file is
/// skipped and the run continues.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no coverage recorded for {path}")]
    NotMeasured { path: String },

    #[error("coverage query failed for {path}: {source}")]
    Query {
        path: String,
        #[source]
        source: DiffCovError,
    },
}

/// Per-file access to "missing" (instrumentable, never executed) lines.
pub trait CoverageSource {
    fn missing_lines(&self, path: &str) -> std::result::Result<BTreeSet<u32>, LookupError>;
}

/// Static missing-line sets keyed by diff path.
impl CoverageSource for BTreeMap<String, BTreeSet<u32>> {
    fn missing_lines(&self, path: &str) -> std::result::Result<BTreeSet<u32>, LookupError> {
        self.get(path).cloned().ok_or_else(|| LookupError::NotMeasured {
            path: path.to_string(),
        })
    }
}

/// One report of a coverage store, plus the root diff paths are relative to.
pub struct CoverageStore {
    conn: Connection,
    report_id: i64,
    report_name: String,
    root: PathBuf,
}

impl CoverageStore {
    /// Load coverage from `path`: a SQLite store, or an LCOV / Cobertura file
    /// ingested into an in-memory store.
    ///
    /// Any failure here means there is no baseline to compare against and is
    /// reported as [`DiffCovError::CoverageBackendUnavailable`].
    pub fn load(
        path: &Path,
        format: Option<Format>,
        report: Option<&str>,
        root: &Path,
    ) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| DiffCovError::unavailable(path, e))?;

        let format = match format {
            Some(f) => f,
            None => detect_format(path, &content).ok_or_else(|| {
                DiffCovError::unavailable(path, "unrecognized coverage format")
            })?,
        };

        let conn = match format {
            Format::Sqlite => {
                db::open_existing(path).map_err(|e| DiffCovError::unavailable(path, e))?
            }
            text_format => {
                let data = parse_with_format(text_format, &content)
                    .map_err(|e| DiffCovError::unavailable(path, e))?;
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("coverage");
                let mut conn = db::open_in_memory()?;
                db::insert_coverage(&mut conn, name, text_format.as_str(), path.to_str(), &data)?;
                info!(
                    format = %text_format,
                    files = data.files.len(),
                    "loaded coverage file"
                );
                conn
            }
        };

        let report_name = match report {
            Some(name) => name.to_string(),
            None => db::get_latest_report_name(&conn)?.ok_or_else(|| {
                DiffCovError::unavailable(path, "coverage store contains no reports")
            })?,
        };

        Self::from_connection(conn, &report_name, root)
    }

    /// Wrap an already-open store.
    pub fn from_connection(conn: Connection, report_name: &str, root: &Path) -> Result<Self> {
        let report_id = db::get_report_id(&conn, report_name)?;
        Ok(Self {
            conn,
            report_id,
            report_name: report_name.to_string(),
            root: root.to_path_buf(),
        })
    }

    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    fn lookup(&self, path: &str) -> Result<Option<Vec<u32>>> {
        let absolute = self.root.join(path);
        let candidates = [absolute.to_string_lossy().into_owned(), path.to_string()];
        for candidate in &candidates {
            if let Some((file_id, stored)) =
                db::find_source_file(&self.conn, self.report_id, candidate)?
            {
                debug!(path = %path, stored = %stored, "resolved coverage file");
                return db::get_missing_lines(&self.conn, self.report_id, file_id).map(Some);
            }
        }
        Ok(None)
    }
}

impl CoverageSource for CoverageStore {
    fn missing_lines(&self, path: &str) -> std::result::Result<BTreeSet<u32>, LookupError> {
        match self.lookup(path) {
            Ok(Some(lines)) => Ok(lines.into_iter().collect()),
            Ok(None) => Err(LookupError::NotMeasured {
                path: path.to_string(),
            }),
            Err(source) => Err(LookupError::Query {
                path: path.to_string(),
                source,
            }),
        }
    }
}
