use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{DiffCovError, Result};
use crate::model::CoverageData;

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Open (or create) a coverage store at the given path.
///
/// Stores keep the default rollback journal so they can later be opened
/// read-only without `-wal`/`-shm` side files.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Open an existing store without creating or modifying it.
pub fn open_existing(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    check_schema_version(&conn)?;
    Ok(conn)
}

/// A scratch store for coverage files ingested on the fly.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: u32 = conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
    if count == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;
        return Ok(());
    }
    check_schema_version(conn)
}

fn check_schema_version(conn: &Connection) -> Result<()> {
    let version: u32 = conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })?;
    if version != SCHEMA_VERSION {
        return Err(DiffCovError::Other(format!(
            "Coverage store schema version {} is not supported (expected {}). \
             Rebuild the store from the original coverage file.",
            version, SCHEMA_VERSION
        )));
    }
    Ok(())
}

/// Insert a parsed `CoverageData` into the database under a new report.
/// Returns the report id.
pub fn insert_coverage(
    conn: &mut Connection,
    name: &str,
    source_format: &str,
    source_file: Option<&str>,
    data: &CoverageData,
) -> Result<i64> {
    let tx = conn.transaction()?;
    let report_id = insert_coverage_tx(&tx, name, source_format, source_file, data)?;
    tx.commit()?;
    Ok(report_id)
}

fn insert_coverage_tx(
    tx: &Transaction,
    name: &str,
    source_format: &str,
    source_file: Option<&str>,
    data: &CoverageData,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO report (name, source_format, source_file, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, source_format, source_file, now],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DiffCovError::Other(format!("Report '{}' already exists.", name))
        }
        other => DiffCovError::Sqlite(other),
    })?;
    let report_id = tx.last_insert_rowid();

    // Cache source_file path -> id mappings
    let mut file_id_cache: HashMap<&str, i64> = HashMap::new();

    let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO line_coverage (report_id, source_file_id, line_number, hit_count) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for file_cov in &data.files {
        let file_id = get_or_insert_source_file(tx, &file_cov.path, &mut file_id_cache)?;
        for line in &file_cov.lines {
            stmt.execute(params![report_id, file_id, line.line_number, line.hit_count])?;
        }
    }

    Ok(report_id)
}

fn get_or_insert_source_file<'a>(
    tx: &Transaction,
    path: &'a str,
    cache: &mut HashMap<&'a str, i64>,
) -> Result<i64> {
    if let Some(&id) = cache.get(path) {
        return Ok(id);
    }
    tx.execute(
        "INSERT OR IGNORE INTO source_file (path) VALUES (?1)",
        params![path],
    )?;
    let id: i64 = tx.query_row(
        "SELECT id FROM source_file WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;
    cache.insert(path, id);
    Ok(id)
}

// ── Query helpers ──────────────────────────────────────────────────────────

/// Return the name of the most recently created report, if any.
pub fn get_latest_report_name(conn: &Connection) -> Result<Option<String>> {
    let name = conn
        .query_row(
            "SELECT name FROM report ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

pub fn get_report_id(conn: &Connection, report_name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM report WHERE name = ?1",
        params![report_name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DiffCovError::ReportNotFound(report_name.to_string()))
}

/// Find the stored source file for `path` that has data in `report_id`.
///
/// Tries an exact match first, then any stored path ending in `/<path>`
/// (coverage tools often record absolute paths while diffs are relative).
/// Returns the file id and the stored path.
pub fn find_source_file(
    conn: &Connection,
    report_id: i64,
    path: &str,
) -> Result<Option<(i64, String)>> {
    let found = conn
        .query_row(
            "SELECT sf.id, sf.path FROM source_file sf
             WHERE (sf.path = ?2 OR substr(sf.path, -(length(?2) + 1)) = '/' || ?2)
             AND EXISTS (
                 SELECT 1 FROM line_coverage lc
                 WHERE lc.report_id = ?1 AND lc.source_file_id = sf.id
             )
             ORDER BY sf.path = ?2 DESC, length(sf.path), sf.path
             LIMIT 1",
            params![report_id, path],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// Instrumentable lines of a file that were never executed, ascending.
pub fn get_missing_lines(conn: &Connection, report_id: i64, source_file_id: i64) -> Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT line_number FROM line_coverage
         WHERE report_id = ?1 AND source_file_id = ?2 AND hit_count = 0
         ORDER BY line_number",
    )?;
    let rows = stmt.query_map(params![report_id, source_file_id], |row| row.get(0))?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}
