//! Diff coverage per file: of the lines a patch adds, how many were executed.
//!
//! A line counts as uncovered when it is both added by the patch and reported
//! missing by the coverage data. Added lines the coverage tool never
//! instrumented (blank lines, comments) count as covered.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::coverage::CoverageSource;
use crate::model::percent;

/// Diff coverage of one changed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReportEntry {
    /// In `[0, 100]`; 100 when no lines were considered.
    pub coverage_percent: f64,
    /// Added lines in the file.
    pub lines_considered: u64,
    /// Added lines not reported missing.
    pub lines_covered: u64,
    /// Added lines reported missing, ascending.
    pub missed_lines: Vec<u32>,
}

impl CoverageReportEntry {
    #[must_use]
    pub fn new(added: &[u32], missing: &BTreeSet<u32>) -> Self {
        let added: BTreeSet<u32> = added.iter().copied().collect();
        let missed_lines: Vec<u32> = added.intersection(missing).copied().collect();
        let lines_considered = added.len() as u64;
        let lines_covered = lines_considered - missed_lines.len() as u64;
        Self {
            coverage_percent: percent(lines_covered, lines_considered),
            lines_considered,
            lines_covered,
            missed_lines,
        }
    }

    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.missed_lines.is_empty()
    }
}

/// A changed file the coverage data could not answer for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

/// Result of one calculation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffCoverage {
    /// Reported files, keyed (and so ordered) by path.
    pub entries: BTreeMap<String, CoverageReportEntry>,
    pub skipped: Vec<SkippedFile>,
    /// Files with added lines that were looked up.
    pub files_considered: usize,
    /// Added lines across every measured file, reported or not.
    pub lines_considered: u64,
    pub lines_covered: u64,
}

/// Compute diff coverage for every file with added lines.
///
/// Fully covered files are only reported when `show_all` is set. Files the
/// coverage source cannot resolve are skipped with a warning.
pub fn compute(
    added: &BTreeMap<String, Vec<u32>>,
    source: &dyn CoverageSource,
    show_all: bool,
) -> DiffCoverage {
    let mut result = DiffCoverage::default();

    for (path, lines) in added {
        if lines.is_empty() {
            continue;
        }
        result.files_considered += 1;

        let missing = match source.missing_lines(path) {
            Ok(missing) => missing,
            Err(e) => {
                warn!(path = %path, "skipping file: {e}");
                result.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let entry = CoverageReportEntry::new(lines, &missing);
        debug!(
            path = %path,
            considered = entry.lines_considered,
            covered = entry.lines_covered,
            "computed diff coverage"
        );
        result.lines_considered += entry.lines_considered;
        result.lines_covered += entry.lines_covered;
        if show_all || !entry.is_fully_covered() {
            result.entries.insert(path.clone(), entry);
        }
    }

    result
}
