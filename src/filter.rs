//! Selection of the changed files that take part in a diff-coverage run.
//!
//! A file is skipped when its path matches an ignore [`Pattern`], or when the
//! path (joined onto the root directory) is not a regular file on disk. A
//! missing file is not an error: deleted files and paths outside the working
//! tree are simply out of scope.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::{DiffCovError, Result};

/// An ignore pattern matched against the diff-relative path.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches when the text occurs anywhere in the path.
    Literal(String),
    /// Matches when the regex finds a match anywhere in the path, unless
    /// the expression anchors itself.
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn regex(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Pattern::Regex)
            .map_err(|source_err| DiffCovError::InvalidPattern {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(path),
            Pattern::Literal(text) => path.contains(text.as_str()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "'{text}'"),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Why a changed file was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Ignored { pattern: String },
    NotFound,
    NotAFile,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Ignored { pattern } => write!(f, "matches ignore pattern {pattern}"),
            Exclusion::NotFound => f.write_str("does not exist under the root directory"),
            Exclusion::NotAFile => f.write_str("is not a regular file"),
        }
    }
}

/// Ignore patterns plus the directory diff paths are relative to.
#[derive(Debug, Clone)]
pub struct FileFilter {
    root: PathBuf,
    patterns: Vec<Pattern>,
}

impl FileFilter {
    pub fn new(root: impl Into<PathBuf>, patterns: Vec<Pattern>) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Absolute location of a diff path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }

    /// The reason `path` is out of scope, or `None` when it is in scope.
    pub fn exclusion(&self, path: &str) -> Option<Exclusion> {
        if let Some(pattern) = self.patterns.iter().find(|p| p.matches(path)) {
            return Some(Exclusion::Ignored {
                pattern: pattern.to_string(),
            });
        }
        match std::fs::metadata(self.resolve(path)) {
            Err(_) => Some(Exclusion::NotFound),
            Ok(meta) if !meta.is_file() => Some(Exclusion::NotAFile),
            Ok(_) => None,
        }
    }

    #[must_use]
    pub fn is_in_scope(&self, path: &str) -> bool {
        self.exclusion(path).is_none()
    }

    /// Keep only the in-scope entries of an added-line index.
    pub fn apply(&self, added: BTreeMap<String, Vec<u32>>) -> BTreeMap<String, Vec<u32>> {
        added
            .into_iter()
            .filter(|(path, _)| match self.exclusion(path) {
                Some(reason) => {
                    debug!(path = %path, %reason, "skipping changed file");
                    false
                }
                None => true,
            })
            .collect()
    }
}
