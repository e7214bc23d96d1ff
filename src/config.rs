//! Run configuration.
//!
//! Values come from three layers, highest precedence first: command-line
//! flags, the TOML settings file, built-in defaults. Paths taken from the
//! settings file or the defaults are relative to the root directory; paths
//! given on the command line are used as given.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::detect::Format;
use crate::error::{DiffCovError, Result};
use crate::filter::Pattern;
use crate::report::OutputFormat;

/// Settings file looked up in the root directory when `--config` is not given.
pub const SETTINGS_FILE: &str = ".diffcov.toml";

pub const DEFAULT_COVERAGE_PATH: &str = "lcov.info";
pub const DEFAULT_OUTPUT_PATH: &str = "diffcoverage.html";

/// An ignore pattern as written in the settings file: a bare string is a
/// literal, a `{ regex = "..." }` table is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Literal(String),
    Regex { regex: String },
}

impl PatternSpec {
    pub fn compile(&self) -> Result<Pattern> {
        match self {
            PatternSpec::Literal(text) => Ok(Pattern::literal(text.as_str())),
            PatternSpec::Regex { regex } => Pattern::regex(regex),
        }
    }
}

/// Ignore patterns used when neither the settings file nor the command line
/// replaces them.
#[must_use]
pub fn default_patterns() -> Vec<PatternSpec> {
    vec![
        PatternSpec::Literal("test".to_string()),
        PatternSpec::Regex {
            regex: "docs.*/".to_string(),
        },
        PatternSpec::Regex {
            regex: r"\.gitignore$".to_string(),
        },
    ]
}

/// Contents of a settings file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub coverage_path: Option<PathBuf>,
    pub ignored_name_patterns: Option<Vec<PatternSpec>>,
    pub output_report_path: Option<PathBuf>,
    pub show_all: Option<bool>,
    /// Report to read from a multi-report coverage store.
    pub report: Option<String>,
}

impl Settings {
    /// Load `explicit` if given (it must exist), otherwise the settings file in
    /// `root` if there is one.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Option<Settings>> {
        if let Some(path) = explicit {
            return Self::load_from(path).map(Some);
        }
        let path = root.join(SETTINGS_FILE);
        if path.is_file() {
            return Self::load_from(&path).map(Some);
        }
        Ok(None)
    }

    pub fn load_from(path: &Path) -> Result<Settings> {
        let contents = std::fs::read_to_string(path).map_err(|e| DiffCovError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let settings = toml::from_str(&contents).map_err(|e| DiffCovError::Config {
            path: path.to_path_buf(),
            reason: e.message().to_string(),
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub coverage_path: Option<PathBuf>,
    pub coverage_format: Option<Format>,
    pub report: Option<String>,
    pub output_path: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
    pub show_all: bool,
    pub ignore: Vec<String>,
    pub ignore_regex: Vec<String>,
    pub no_default_ignores: bool,
    pub path_prefix: Option<String>,
}

/// Effective configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub coverage_path: PathBuf,
    pub coverage_format: Option<Format>,
    pub report: Option<String>,
    pub patterns: Vec<Pattern>,
    pub output_path: PathBuf,
    pub output_format: OutputFormat,
    pub show_all: bool,
    pub path_prefix: Option<String>,
}

impl Config {
    /// Resolve the root, find the settings file and merge everything.
    pub fn load(cli: &CliOverrides) -> Result<Config> {
        let root = resolve_root(cli.root.as_deref());
        let settings = Settings::discover(&root, cli.config_path.as_deref())?;
        resolve_config(settings.as_ref(), cli, root)
    }
}

/// Canonical form of the root directory, or the path as given when it cannot
/// be canonicalized.
#[must_use]
pub fn resolve_root(root: Option<&Path>) -> PathBuf {
    let root = root.unwrap_or_else(|| Path::new("."));
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Merge settings and command-line values over the defaults.
pub fn resolve_config(
    settings: Option<&Settings>,
    cli: &CliOverrides,
    root: PathBuf,
) -> Result<Config> {
    let coverage_path = cli
        .coverage_path
        .clone()
        .or_else(|| {
            settings
                .and_then(|s| s.coverage_path.as_ref())
                .map(|p| root.join(p))
        })
        .unwrap_or_else(|| root.join(DEFAULT_COVERAGE_PATH));

    let output_path = cli
        .output_path
        .clone()
        .or_else(|| {
            settings
                .and_then(|s| s.output_report_path.as_ref())
                .map(|p| root.join(p))
        })
        .unwrap_or_else(|| root.join(DEFAULT_OUTPUT_PATH));

    let output_format = cli
        .output_format
        .unwrap_or_else(|| OutputFormat::from_path(&output_path));

    let show_all = cli.show_all || settings.and_then(|s| s.show_all).unwrap_or(false);

    let report = cli
        .report
        .clone()
        .or_else(|| settings.and_then(|s| s.report.clone()));

    let mut specs = match settings.and_then(|s| s.ignored_name_patterns.clone()) {
        Some(specs) => specs,
        None if cli.no_default_ignores => Vec::new(),
        None => default_patterns(),
    };
    specs.extend(cli.ignore.iter().cloned().map(PatternSpec::Literal));
    specs.extend(
        cli.ignore_regex
            .iter()
            .map(|regex| PatternSpec::Regex { regex: regex.clone() }),
    );
    let patterns = specs
        .iter()
        .map(PatternSpec::compile)
        .collect::<Result<Vec<_>>>()?;

    Ok(Config {
        root,
        coverage_path,
        coverage_format: cli.coverage_format,
        report,
        patterns,
        output_path,
        output_format,
        show_all,
        path_prefix: cli.path_prefix.clone(),
    })
}
