//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageData` which is then inserted
//! into the SQLite store.

/// Percentage of `covered` out of `total`.
///
/// An empty denominator means there was nothing to miss, so it is reported
/// as fully covered (100.0) rather than as a division error.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// A single line that was instrumentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
}

/// Coverage data for a single source file.
#[derive(Debug, Clone, Default)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }
}

/// The complete result of parsing a single coverage file.
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }
}
