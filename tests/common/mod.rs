#![allow(dead_code)]

use std::path::{Path, PathBuf};

use diffcov::config::{resolve_config, CliOverrides, Config};
use rusqlite::Connection;
use tempfile::TempDir;

/// Create a scratch working tree containing `files`, each twenty lines long.
/// The caller must hold onto `TempDir` to keep the directory alive.
pub fn setup_repo(files: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let body: String = (1..=20).map(|i| format!("line {i}\n")).collect();
    for file in files {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, &body).unwrap();
    }
    dir
}

/// Write an LCOV file with `(line, hits)` records per source path.
pub fn write_lcov(dir: &Path, name: &str, records: &[(&str, &[(u32, u64)])]) -> PathBuf {
    let mut lcov = String::new();
    for (path, lines) in records {
        lcov.push_str(&format!("SF:{path}\n"));
        for (line, hits) in lines.iter() {
            lcov.push_str(&format!("DA:{line},{hits}\n"));
        }
        lcov.push_str("end_of_record\n");
    }
    let path = dir.join(name);
    std::fs::write(&path, lcov).unwrap();
    path
}

/// Create a fresh coverage store in `dir`, returning the connection and its path.
pub fn setup_store(dir: &Path) -> (Connection, PathBuf) {
    let db_path = dir.join("coverage.db");
    let conn = diffcov::db::open(&db_path).unwrap();
    diffcov::db::init_schema(&conn).unwrap();
    (conn, db_path)
}

/// Resolve a configuration rooted at `dir` with no settings file.
pub fn config_for(dir: &Path, cli: CliOverrides) -> Config {
    resolve_config(None, &cli, dir.to_path_buf()).unwrap()
}
