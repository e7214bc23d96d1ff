//! Output formatting for diff coverage results.

use std::fmt::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use crate::compute::{CoverageReportEntry, DiffCoverage, SkippedFile};
use crate::error::Result;
use crate::model::percent;

/// One reported file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFile {
    pub path: String,
    #[serde(flatten)]
    pub entry: CoverageReportEntry,
}

/// Diff coverage results, ready to be formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffCoverageReport {
    pub generated_at: DateTime<Utc>,
    /// Changed files that had added lines and were looked up.
    pub files_considered: usize,
    /// Added lines across all measured files.
    pub lines_considered: u64,
    /// Of those, lines that were not reported missing.
    pub lines_covered: u64,
    pub coverage_percent: f64,
    /// Reported files, ascending by path.
    pub files: Vec<ReportFile>,
    /// Files the coverage data had nothing for.
    pub skipped: Vec<SkippedFile>,
}

impl DiffCoverageReport {
    /// Assemble a report stamped with the current time.
    #[must_use]
    pub fn new(result: DiffCoverage) -> Self {
        Self::assemble(result, Utc::now())
    }

    #[must_use]
    pub fn assemble(result: DiffCoverage, generated_at: DateTime<Utc>) -> Self {
        let files = result
            .entries
            .into_iter()
            .map(|(path, entry)| ReportFile { path, entry })
            .collect();
        Self {
            generated_at,
            files_considered: result.files_considered,
            lines_considered: result.lines_considered,
            lines_covered: result.lines_covered,
            coverage_percent: percent(result.lines_covered, result.lines_considered),
            files,
            skipped: result.skipped,
        }
    }

    /// Format using a specific formatter.
    pub fn format(&self, formatter: &dyn ReportFormatter) -> Result<String> {
        formatter.format(self)
    }
}

/// Trait for formatting diff coverage reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &DiffCoverageReport) -> Result<String>;
}

/// Rendering targets for the written report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Html,
    Json,
    Text,
}

impl OutputFormat {
    /// Infer the format from an output path: `.json`, `.txt`, otherwise HTML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => OutputFormat::Json,
            Some("txt") => OutputFormat::Text,
            _ => OutputFormat::Html,
        }
    }

    #[must_use]
    pub fn formatter(self) -> Box<dyn ReportFormatter> {
        match self {
            OutputFormat::Html => Box::new(HtmlFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
            OutputFormat::Text => Box::new(TextFormatter),
        }
    }
}

/// Plain text formatter, one line per reported file.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &DiffCoverageReport) -> Result<String> {
        let mut out = String::new();

        if report.files_considered == 0 {
            out.push_str("No changed files with added lines in scope.\n");
            return Ok(out);
        }

        for f in &report.files {
            let path = &f.path;
            let pct = f.entry.coverage_percent;
            let _ = write!(out, "{path}: {pct:.1}% coverage");
            if !f.entry.missed_lines.is_empty() {
                let missed = format_line_ranges(&f.entry.missed_lines);
                let _ = write!(out, "  missed: {missed}");
            }
            out.push('\n');
        }
        if report.files.is_empty() && report.lines_considered > 0 {
            out.push_str("All added lines are covered.\n");
        }

        for skipped in &report.skipped {
            let _ = writeln!(out, "skipped {}: {}", skipped.path, skipped.reason);
        }

        let pct = report.coverage_percent;
        let covered = report.lines_covered;
        let total = report.lines_considered;
        let _ = writeln!(
            out,
            "Diff coverage: {pct:.1}% ({covered}/{total} lines covered)"
        );
        Ok(out)
    }
}

/// Standalone HTML page with one table row per reported file.
pub struct HtmlFormatter;

impl ReportFormatter for HtmlFormatter {
    fn format(&self, report: &DiffCoverageReport) -> Result<String> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<title>Diff coverage</title>\n");
        html.push_str(
            "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
             td,th{border:1px solid #ccc;padding:4px 8px}td.num{text-align:right}</style>\n",
        );
        html.push_str("</head>\n<body>\n");

        let _ = writeln!(
            html,
            "<h1>Diff coverage: {:.1}%</h1>\n<p>{} of {} added lines covered. Generated {}.</p>",
            report.coverage_percent,
            report.lines_covered,
            report.lines_considered,
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );

        html.push_str("<table>\n<tr><th>File</th><th>Coverage</th><th>Lines considered</th>");
        html.push_str("<th>Lines covered</th><th>Missed lines</th></tr>\n");
        for f in &report.files {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td class=\"num\">{:.1}%</td><td class=\"num\">{}</td>\
                 <td class=\"num\">{}</td><td>{}</td></tr>",
                escape_html(&f.path),
                f.entry.coverage_percent,
                f.entry.lines_considered,
                f.entry.lines_covered,
                format_line_ranges(&f.entry.missed_lines),
            );
        }
        html.push_str("</table>\n");

        if !report.skipped.is_empty() {
            html.push_str("<h2>Skipped files</h2>\n<ul>\n");
            for s in &report.skipped {
                let _ = writeln!(
                    html,
                    "<li>{}: {}</li>",
                    escape_html(&s.path),
                    escape_html(&s.reason)
                );
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &DiffCoverageReport) -> Result<String> {
        let mut json = serde_json::to_string_pretty(report)?;
        json.push('\n');
        Ok(json)
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Coalesce sorted, deduplicated line numbers into `(start, end)` runs.
#[must_use]
pub fn coalesce_ranges(lines: &[u32]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if line == *end + 1 => *end = line,
            _ => ranges.push((line, line)),
        }
    }
    ranges
}

/// Format line numbers into compact range notation, e.g. "1, 3-5, 8".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    coalesce_ranges(lines)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn sample() -> DiffCoverageReport {
        let mut entries = BTreeMap::new();
        entries.insert(
            "lib/foo.src".to_string(),
            CoverageReportEntry {
                coverage_percent: 200.0 / 3.0,
                lines_considered: 3,
                lines_covered: 2,
                missed_lines: vec![10],
            },
        );
        entries.insert(
            "lib/<b>.src".to_string(),
            CoverageReportEntry {
                coverage_percent: 50.0,
                lines_considered: 4,
                lines_covered: 2,
                missed_lines: vec![3, 4],
            },
        );
        let result = DiffCoverage {
            entries,
            skipped: vec![SkippedFile {
                path: "gen/out.src".to_string(),
                reason: "no coverage recorded for gen/out.src".to_string(),
            }],
            files_considered: 4,
            lines_considered: 9,
            lines_covered: 6,
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        DiffCoverageReport::assemble(result, at)
    }

    // -- coalesce_ranges / format_line_ranges --------------------------------

    #[test]
    fn test_coalesce_ranges_empty() {
        assert_eq!(coalesce_ranges(&[]), Vec::<(u32, u32)>::new());
    }

    #[test]
    fn test_coalesce_ranges_mixed() {
        assert_eq!(
            coalesce_ranges(&[1, 2, 3, 7, 9, 10]),
            vec![(1, 3), (7, 7), (9, 10)]
        );
    }

    #[test]
    fn test_format_line_ranges() {
        assert_eq!(format_line_ranges(&[]), "");
        assert_eq!(format_line_ranges(&[5]), "5");
        assert_eq!(format_line_ranges(&[1, 3, 4, 5, 10]), "1, 3-5, 10");
    }

    // -- assembly ------------------------------------------------------------

    #[test]
    fn test_files_sorted_by_path() {
        let report = sample();
        let paths: Vec<_> = report.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/<b>.src", "lib/foo.src"]);
        assert!((report.coverage_percent - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_empty_report_is_fully_covered() {
        let report = DiffCoverageReport::new(DiffCoverage::default());
        assert_eq!(report.coverage_percent, 100.0);
        assert!(report.files.is_empty());
    }

    // -- formatters ----------------------------------------------------------

    #[test]
    fn test_format_text() {
        let text = sample().format(&TextFormatter).unwrap();
        assert!(text.contains("lib/foo.src: 66.7% coverage  missed: 10\n"));
        assert!(text.contains("lib/<b>.src: 50.0% coverage  missed: 3-4\n"));
        assert!(text.contains("skipped gen/out.src"));
        assert!(text.contains("Diff coverage: 66.7% (6/9 lines covered)"));
    }

    #[test]
    fn test_format_text_no_files_in_scope() {
        let report = DiffCoverageReport::new(DiffCoverage::default());
        let text = report.format(&TextFormatter).unwrap();
        assert_eq!(text, "No changed files with added lines in scope.\n");
    }

    #[test]
    fn test_format_text_all_covered() {
        let result = DiffCoverage {
            files_considered: 1,
            lines_considered: 2,
            lines_covered: 2,
            ..Default::default()
        };
        let text = DiffCoverageReport::new(result).format(&TextFormatter).unwrap();
        assert!(text.contains("All added lines are covered."));
        assert!(text.contains("Diff coverage: 100.0% (2/2 lines covered)"));
    }

    #[test]
    fn test_format_html_escapes_paths() {
        let html = sample().format(&HtmlFormatter).unwrap();
        assert!(html.contains("<td>lib/&lt;b&gt;.src</td>"));
        assert!(!html.contains("lib/<b>.src"));
        assert!(html.contains("<td class=\"num\">66.7%</td><td class=\"num\">3</td>"));
        assert!(html.contains("Skipped files"));
        assert!(html.contains("2024-05-01 12:00:00 UTC"));
    }

    #[test]
    fn test_format_json() {
        let json = sample().format(&JsonFormatter).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["lines_considered"], 9);
        assert_eq!(value["files"][1]["path"], "lib/foo.src");
        assert_eq!(value["files"][1]["lines_covered"], 2);
        assert_eq!(value["files"][1]["missed_lines"][0], 10);
        assert_eq!(value["skipped"][0]["path"], "gen/out.src");
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out.json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path(Path::new("out.TXT")), OutputFormat::Text);
        assert_eq!(OutputFormat::from_path(Path::new("out.html")), OutputFormat::Html);
        assert_eq!(OutputFormat::from_path(Path::new("report")), OutputFormat::Html);
    }
}
