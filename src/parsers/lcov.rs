/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Records used for line coverage:
///   SF:<path to source file>
///   DA:<line number>,<execution count>[,<checksum>]
///   end_of_record
///
/// Function, branch and summary records (FN, FNDA, BRDA, LF, LH, ...) carry
/// nothing diff coverage needs and are skipped.
use std::collections::BTreeMap;

use crate::error::{DiffCovError, Result};
use crate::model::*;
use crate::parsers::Parser;

/// LCOV format parser.
pub struct LcovParser;

impl Parser for LcovParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        let text = std::str::from_utf8(input)
            .map_err(|e| DiffCovError::Parse(format!("Invalid UTF-8 in LCOV data: {e}")))?;
        Ok(parse_lcov(text))
    }
}

fn parse_lcov(text: &str) -> CoverageData {
    let mut data = CoverageData::new();
    let mut current: Option<(String, BTreeMap<u32, u64>)> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "end_of_record" {
            if let Some((path, lines)) = current.take() {
                data.files.push(finish_file(path, lines));
            }
            continue;
        }

        let (tag, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };

        match tag {
            "SF" => {
                // A new SF without end_of_record closes the previous file.
                if let Some((path, lines)) = current.take() {
                    data.files.push(finish_file(path, lines));
                }
                current = Some((value.to_string(), BTreeMap::new()));
            }
            "DA" => {
                // Some instrumenters use negative counts (e.g., -1) to mark
                // non-instrumentable lines; those are skipped.
                let Some((_, lines)) = current.as_mut() else {
                    continue;
                };
                let mut parts = value.splitn(3, ',');
                let line_number = parts.next().and_then(|n| n.parse::<u32>().ok());
                let count = parts.next().and_then(|c| c.parse::<i64>().ok());
                if let (Some(line_number), Some(count)) = (line_number, count) {
                    if count >= 0 {
                        // Repeated DA records for one line (merged tracefiles) sum.
                        let hits = lines.entry(line_number).or_insert(0);
                        *hits = hits.saturating_add(count as u64);
                    }
                }
            }
            _ => {}
        }
    }

    if let Some((path, lines)) = current.take() {
        data.files.push(finish_file(path, lines));
    }

    data
}

fn finish_file(path: String, lines: BTreeMap<u32, u64>) -> FileCoverage {
    let mut file = FileCoverage::new(path);
    file.lines = lines
        .into_iter()
        .map(|(line_number, hit_count)| LineCoverage {
            line_number,
            hit_count,
        })
        .collect();
    file
}
