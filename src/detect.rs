/// Auto-detection of coverage file formats.
///
/// Strategy:
///   1. Check for the SQLite file header (a previously built store)
///   2. Check file extension for strong hints
///   3. Peek at the first bytes of the file content
///   4. Fall back to CLI --coverage-format override (handled by caller)
use std::path::Path;

use crate::error::DiffCovError;

/// Every SQLite 3 database file starts with this 16-byte header.
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Supported coverage inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cobertura,
    Lcov,
    /// A SQLite coverage store.
    Sqlite,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Lcov => "lcov",
            Format::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = DiffCovError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cobertura" | "xml" => Ok(Format::Cobertura),
            "lcov" => Ok(Format::Lcov),
            "sqlite" | "db" => Ok(Format::Sqlite),
            _ => Err(DiffCovError::Parse(format!(
                "Unknown format: '{}'. Supported: cobertura, lcov, sqlite",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the coverage format from filename and file content.
pub fn detect_format(path: &Path, content: &[u8]) -> Option<Format> {
    if content.starts_with(SQLITE_MAGIC) {
        return Some(Format::Sqlite);
    }

    if let Some(fmt) = detect_by_extension(path) {
        return Some(fmt);
    }

    detect_by_content(content)
}

fn detect_by_extension(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "info" | "lcov" => Some(Format::Lcov),
        // .xml could be anything; content inspection decides.
        _ => None,
    }
}

fn detect_by_content(content: &[u8]) -> Option<Format> {
    // We only need to look at the first few KB
    let head_len = content.len().min(4096);
    let head = String::from_utf8_lossy(&content[..head_len]);

    // LCOV: lines start with TN:, SF:, DA:, etc.
    // Check that lines actually start with these tags to avoid false positives
    // on files that merely contain these strings.
    let has_sf = head.lines().any(|l| l.starts_with("SF:"));
    let has_da_or_fn = head.lines().any(|l| l.starts_with("DA:") || l.starts_with("FN:"));
    if has_sf && has_da_or_fn {
        return Some(Format::Lcov);
    }

    if (head.contains("<?xml") || head.trim_start().starts_with('<')) && head.contains("<coverage")
    {
        return Some(Format::Cobertura);
    }

    None
}
