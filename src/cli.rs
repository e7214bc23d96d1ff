//! Command handler for the diffcov CLI.
//!
//! [`cmd_diff_coverage`] returns its console output as a `String`, making it
//! easy to test without capturing stdout.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use crate::compute::compute;
use crate::config::Config;
use crate::coverage::CoverageStore;
use crate::diff::{self, DiffSource};
use crate::filter::FileFilter;
use crate::report::{DiffCoverageReport, TextFormatter};

/// Run the pipeline on a diff: parse, filter, query coverage, compute.
///
/// A malformed patch or unusable coverage data aborts the run. Files the
/// coverage data does not know are reported as skipped.
pub fn diff_coverage(config: &Config, diff_text: &str) -> Result<DiffCoverageReport> {
    let added = diff::parse_diff(diff_text).context("Failed to parse patch")?;
    measure(config, added)
}

/// Filter the added-line index, query coverage and compute the report.
fn measure(config: &Config, added: BTreeMap<String, Vec<u32>>) -> Result<DiffCoverageReport> {
    info!(files = added.len(), "parsed patch");

    let filter = FileFilter::new(&config.root, config.patterns.clone());
    let mut added = filter.apply(added);
    info!(files = added.len(), "filtered changed files");

    if let Some(prefix) = &config.path_prefix {
        added = diff::apply_path_prefix(added, prefix);
    }

    let store = CoverageStore::load(
        &config.coverage_path,
        config.coverage_format,
        config.report.as_deref(),
        &config.root,
    )
    .context("Failed to load coverage data")?;
    info!(report = store.report_name(), "loaded coverage");

    let result = compute(&added, &store, config.show_all);
    Ok(DiffCoverageReport::new(result))
}

/// Fetch the diff, write the rendered report to the configured output path
/// and return the plain-text summary.
pub fn cmd_diff_coverage(config: &Config, source: &dyn DiffSource) -> Result<String> {
    let _span = info_span!("diff_coverage", diff = %source.describe()).entered();

    let diff_text = source.fetch_diff()?;
    let added = diff::parse_diff(&diff_text)
        .with_context(|| format!("Failed to parse patch {}", source.describe()))?;
    let report = measure(config, added)?;

    let rendered = report.format(config.output_format.formatter().as_ref())?;
    write_report(&config.output_path, &rendered)?;
    info!(
        path = %config.output_path.display(),
        format = ?config.output_format,
        "wrote report"
    );

    Ok(report.format(&TextFormatter)?)
}

fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
