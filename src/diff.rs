/// Parse a unified diff into a [`PatchSet`] and derive, per target file, the
/// line numbers the patch adds. Those are the lines "diff coverage" is
/// measured over.
///
/// Also provides a [`DiffSource`] trait that abstracts over different
/// ways to obtain a diff (patch file, stdin, git).
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use tracing::debug;

use crate::error::{DiffCovError, Result};

/// Target path used by unified diffs for a deleted file.
pub const DEV_NULL: &str = "/dev/null";

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// A source for obtaining a unified diff.
pub trait DiffSource {
    /// Fetch the diff text.
    fn fetch_diff(&self) -> anyhow::Result<String>;

    /// Short human-readable description, used in diagnostics.
    fn describe(&self) -> String;
}

/// Diff stored in a patch file. A path of `-` reads stdin.
pub struct PatchFile {
    pub path: PathBuf,
}

impl DiffSource for PatchFile {
    fn fetch_diff(&self) -> anyhow::Result<String> {
        if self.path.as_os_str() == "-" {
            return std::io::read_to_string(std::io::stdin())
                .context("Failed to read diff from stdin");
        }
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read patch file {}", self.path.display()))
    }

    fn describe(&self) -> String {
        if self.path.as_os_str() == "-" {
            "<stdin>".to_string()
        } else {
            self.path.display().to_string()
        }
    }
}

/// Diff from a git command (e.g., `git diff master`).
pub struct GitDiff {
    /// Arguments to pass to `git diff`.
    pub args: String,
}

impl DiffSource for GitDiff {
    fn fetch_diff(&self) -> anyhow::Result<String> {
        let diff_args: Vec<&str> = self.args.split_whitespace().collect();
        let output = Command::new("git")
            .arg("diff")
            .args(&diff_args)
            .output()
            .context("Failed to run git diff")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("git diff failed: {}", stderr.trim());
        }

        String::from_utf8(output.stdout).context("git diff output not valid UTF-8")
    }

    fn describe(&self) -> String {
        format!("git diff {}", self.args)
    }
}

// ---------------------------------------------------------------------------
// Patch model
// ---------------------------------------------------------------------------

/// One line of a hunk body, tagged by its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Added(String),
    Removed(String),
    Context(String),
}

/// A single `@@ -a,b +c,d @@` section of a file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub source_start: u32,
    pub source_len: u32,
    /// 1-based line in the target file where this hunk begins.
    pub target_start: u32,
    pub target_len: u32,
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Target-side line numbers of the lines this hunk adds.
    ///
    /// Added and context lines each occupy one target line; removed lines
    /// occupy none.
    #[must_use]
    pub fn added_lines(&self) -> Vec<u32> {
        let mut added = Vec::new();
        let mut line_offset = self.target_start;
        for line in &self.lines {
            match line {
                DiffLine::Removed(_) => {}
                DiffLine::Added(_) => {
                    added.push(line_offset);
                    line_offset += 1;
                }
                DiffLine::Context(_) => line_offset += 1,
            }
        }
        added
    }
}

/// All hunks for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub source_path: String,
    /// Target path as written in the `+++` header, VCS prefix stripped.
    pub target_path: String,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    #[must_use]
    pub fn is_removed_file(&self) -> bool {
        self.target_path == DEV_NULL
    }

    /// Added target lines over all hunks, in hunk order.
    #[must_use]
    pub fn added_lines(&self) -> Vec<u32> {
        self.hunks.iter().flat_map(Hunk::added_lines).collect()
    }
}

/// A parsed patch: one [`FileDiff`] per `---`/`+++` section, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    pub files: Vec<FileDiff>,
}

impl PatchSet {
    /// Parse unified diff text. Any malformed header or hunk aborts the whole
    /// parse with [`DiffCovError::PatchFormat`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut parser = PatchParser::default();
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
        while let Some((lineno, line)) = lines.next() {
            parser.feed(lineno, line, &mut lines)?;
        }
        parser.finish()
    }

    /// Map of target path -> added line numbers (the added-line index).
    ///
    /// Files without any added line (pure deletions, mode changes) are
    /// absent. Sections touching the same target are merged, so each file's
    /// lines are ascending and free of duplicates.
    #[must_use]
    pub fn added_lines(&self) -> BTreeMap<String, Vec<u32>> {
        let mut index: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for file in &self.files {
            if file.is_removed_file() {
                continue;
            }
            let lines = file.added_lines();
            if lines.is_empty() {
                continue;
            }
            index
                .entry(file.target_path.clone())
                .or_default()
                .extend(lines);
        }
        for lines in index.values_mut() {
            lines.sort_unstable();
            lines.dedup();
        }
        index
    }
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// Parse a unified diff (e.g., `git diff`) and return a map of
/// file path -> list of added line numbers (in the new file).
pub fn parse_diff(diff_text: &str) -> Result<BTreeMap<String, Vec<u32>>> {
    let patch = PatchSet::parse(diff_text)?;
    let index = patch.added_lines();
    debug!(
        files = patch.files.len(),
        files_with_additions = index.len(),
        "parsed patch"
    );
    Ok(index)
}

/// Prepend a path prefix to all file paths in a diff result.
pub fn apply_path_prefix(
    diff_lines: BTreeMap<String, Vec<u32>>,
    prefix: &str,
) -> BTreeMap<String, Vec<u32>> {
    let prefix = prefix.trim_end_matches('/');
    diff_lines
        .into_iter()
        .map(|(path, lines)| (format!("{prefix}/{path}"), lines))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside any file section: git preamble, commit messages, etc.
    Preamble,
    /// Inside a file section, between hunks.
    InFile,
    /// Inside a hunk body with this many source/target lines still expected.
    InHunk { source_left: u32, target_left: u32 },
}

struct PatchParser {
    files: Vec<FileDiff>,
    state: State,
    last_line: usize,
}

impl Default for PatchParser {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            state: State::Preamble,
            last_line: 0,
        }
    }
}

impl PatchParser {
    fn feed<'a, I>(&mut self, lineno: usize, line: &'a str, rest: &mut I) -> Result<()>
    where
        I: Iterator<Item = (usize, &'a str)>,
    {
        self.last_line = lineno;

        if let State::InHunk {
            source_left,
            target_left,
        } = self.state
        {
            return self.hunk_line(lineno, line, source_left, target_left);
        }

        if let Some(source) = line.strip_prefix("--- ") {
            let target = match rest.next() {
                Some((next_no, next)) => {
                    self.last_line = next_no;
                    next.strip_prefix("+++ ").ok_or_else(|| {
                        DiffCovError::patch(next_no, "expected '+++' header after '---' header")
                    })?
                }
                None => return Err(DiffCovError::patch(lineno, "'---' header without '+++' header")),
            };
            self.files.push(FileDiff {
                source_path: clean_path(source),
                target_path: clean_path(target),
                hunks: Vec::new(),
            });
            self.state = State::InFile;
            return Ok(());
        }

        if line.starts_with("@@") {
            if self.state != State::InFile {
                return Err(DiffCovError::patch(
                    lineno,
                    "hunk header outside of a file section",
                ));
            }
            return self.start_hunk(lineno, line);
        }

        if self.state == State::InFile {
            // Mail signature emitted by `git format-patch` after the last hunk.
            if line == "--" || line == "-- " {
                self.state = State::Preamble;
                return Ok(());
            }
            match line.chars().next() {
                Some('+') | Some('-') | Some(' ') => {
                    return Err(DiffCovError::patch(
                        lineno,
                        "diff line outside of a hunk (hunk longer than its header declares?)",
                    ));
                }
                Some('\\') | None => return Ok(()),
                Some(_) => self.state = State::Preamble,
            }
        }

        Ok(())
    }

    fn start_hunk(&mut self, lineno: usize, line: &str) -> Result<()> {
        let (source_start, source_len, target_start, target_len) = parse_hunk_header(line)
            .ok_or_else(|| DiffCovError::patch(lineno, format!("malformed hunk header '{line}'")))?;
        if target_start == 0 && target_len != 0 {
            return Err(DiffCovError::patch(
                lineno,
                "hunk targets line 0 but declares target lines",
            ));
        }
        if target_start.checked_add(target_len).is_none() {
            return Err(DiffCovError::patch(lineno, "hunk range is out of bounds"));
        }

        let file = self
            .files
            .last_mut()
            .ok_or_else(|| DiffCovError::patch(lineno, "hunk header before any file header"))?;
        file.hunks.push(Hunk {
            source_start,
            source_len,
            target_start,
            target_len,
            lines: Vec::new(),
        });

        self.state = if source_len == 0 && target_len == 0 {
            State::InFile
        } else {
            State::InHunk {
                source_left: source_len,
                target_left: target_len,
            }
        };
        Ok(())
    }

    fn hunk_line(
        &mut self,
        lineno: usize,
        line: &str,
        mut source_left: u32,
        mut target_left: u32,
    ) -> Result<()> {
        let diff_line = match line.chars().next() {
            // Some tools strip the single space of blank context lines.
            None => DiffLine::Context(String::new()),
            Some(' ') => DiffLine::Context(line[1..].to_string()),
            Some('+') => DiffLine::Added(line[1..].to_string()),
            Some('-') => DiffLine::Removed(line[1..].to_string()),
            // "\ No newline at end of file": metadata, not a line.
            Some('\\') => return Ok(()),
            Some(_) => {
                return Err(DiffCovError::patch(
                    lineno,
                    format!(
                        "truncated hunk: {source_left} source and {target_left} target lines still expected"
                    ),
                ));
            }
        };

        let overflow = || {
            DiffCovError::patch(lineno, "hunk has more lines than its header declares")
        };
        match diff_line {
            DiffLine::Context(_) => {
                if source_left == 0 || target_left == 0 {
                    return Err(overflow());
                }
                source_left -= 1;
                target_left -= 1;
            }
            DiffLine::Added(_) => {
                if target_left == 0 {
                    return Err(overflow());
                }
                target_left -= 1;
            }
            DiffLine::Removed(_) => {
                if source_left == 0 {
                    return Err(overflow());
                }
                source_left -= 1;
            }
        }

        // start_hunk always pushes onto the last file before entering InHunk.
        if let Some(hunk) = self.files.last_mut().and_then(|f| f.hunks.last_mut()) {
            hunk.lines.push(diff_line);
        }

        self.state = if source_left == 0 && target_left == 0 {
            State::InFile
        } else {
            State::InHunk {
                source_left,
                target_left,
            }
        };
        Ok(())
    }

    fn finish(self) -> Result<PatchSet> {
        if let State::InHunk {
            source_left,
            target_left,
        } = self.state
        {
            return Err(DiffCovError::patch(
                self.last_line,
                format!(
                    "patch ends inside a hunk: {source_left} source and {target_left} target lines missing"
                ),
            ));
        }
        Ok(PatchSet { files: self.files })
    }
}

/// Parse a hunk header like "@@ -10,5 +20,8 @@ fn main()" into
/// `(source_start, source_len, target_start, target_len)`.
/// Omitted lengths default to 1.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let rest = line.strip_prefix("@@ -")?;
    let (ranges, _section) = rest.split_once(" @@")?;
    let (source, target) = ranges.split_once(" +")?;
    let (source_start, source_len) = parse_range(source)?;
    let (target_start, target_len) = parse_range(target)?;
    Some((source_start, source_len, target_start, target_len))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Normalize a path from a `---`/`+++` header: drop a trailing timestamp,
/// decode a quoted name, and strip the `a/` / `b/` VCS prefix.
fn clean_path(raw: &str) -> String {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    let unquoted = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .map(unquote_c_style);
    let path = unquoted.as_deref().unwrap_or(path);
    if path == DEV_NULL {
        return path.to_string();
    }
    path.strip_prefix("b/")
        .or_else(|| path.strip_prefix("a/"))
        .unwrap_or(path)
        .to_string()
}

/// Decode the body of a git-quoted path. Octal escapes are raw bytes and are
/// reassembled as UTF-8.
fn unquote_c_style(quoted: &str) -> String {
    let mut bytes = Vec::with_capacity(quoted.len());
    let mut rest = quoted.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let Some((&esc, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        match esc {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b'f' => bytes.push(0x0c),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b't' => bytes.push(b'\t'),
            b'v' => bytes.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match rest.split_first() {
                        Some((&d @ b'0'..=b'7', tail)) => {
                            value = value * 8 + u32::from(d - b'0');
                            rest = tail;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                // Three octal digits can exceed a byte; keep the low eight bits.
                bytes.push((value & 0xff) as u8);
            }
            other => bytes.push(other),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Hunk header tests --------------------------------------------------

    #[test]
    fn test_parse_hunk_header() {
        assert_eq!(parse_hunk_header("@@ -10,5 +20,8 @@"), Some((10, 5, 20, 8)));
        assert_eq!(parse_hunk_header("@@ -0,0 +1,3 @@"), Some((0, 0, 1, 3)));
        assert_eq!(parse_hunk_header("@@ -5 +5 @@"), Some((5, 1, 5, 1)));
        assert_eq!(
            parse_hunk_header("@@ -3,4 +3,5 @@ fn main() {"),
            Some((3, 4, 3, 5))
        );
    }

    #[test]
    fn test_parse_hunk_header_malformed() {
        assert_eq!(parse_hunk_header("@@ -a,1 +1,1 @@"), None);
        assert_eq!(parse_hunk_header("@@ +1,1 @@"), None);
        assert_eq!(parse_hunk_header("@@ -1,1 +1,1"), None);
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("b/src/lib.rs"), "src/lib.rs");
        assert_eq!(clean_path("a/src/lib.rs"), "src/lib.rs");
        assert_eq!(clean_path("src/lib.rs\t2024-01-01 10:00:00"), "src/lib.rs");
        assert_eq!(clean_path("\"b/with space.rs\""), "with space.rs");
        assert_eq!(clean_path("/dev/null"), DEV_NULL);
    }

    #[test]
    fn test_clean_path_decodes_quoted_names() {
        assert_eq!(clean_path(r#""b/caf\303\251.py""#), "café.py");
        assert_eq!(clean_path(r#""b/a\"q\".py""#), "a\"q\".py");
        assert_eq!(clean_path(r#""b/back\\slash.py""#), "back\\slash.py");
        assert_eq!(clean_path(r#""b/tab\there.py""#), "tab\there.py");
        assert_eq!(clean_path(r#""b/new\nline.py""#), "new\nline.py");
    }

    #[test]
    fn test_quoted_header_path_in_patch() {
        let diff = "\
--- \"a/caf\\303\\251.py\"
+++ \"b/caf\\303\\251.py\"
@@ -1,1 +1,2 @@
 a
+b
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("café.py").unwrap(), &[2]);
    }

    // -- Added-line numbering -----------------------------------------------

    #[test]
    fn test_context_then_additions() {
        let diff = "\
--- a/lib/foo.src
+++ b/lib/foo.src
@@ -8,2 +8,5 @@
 first
 second
+one
+two
+three
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("lib/foo.src").unwrap(), &[10, 11, 12]);
    }

    #[test]
    fn test_removed_lines_do_not_advance() {
        let diff = "\
--- a/x.py
+++ b/x.py
@@ -1,4 +1,4 @@
 a
-b
-c
+B
+C
 d
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("x.py").unwrap(), &[2, 3]);
    }

    #[test]
    fn test_removals_only_file_is_absent() {
        let diff = "\
--- a/gone.py
+++ b/gone.py
@@ -1,3 +1,1 @@
 keep
-drop one
-drop two
";
        let patch = PatchSet::parse(diff).unwrap();
        assert_eq!(patch.files.len(), 1);
        assert!(patch.added_lines().is_empty());
    }

    #[test]
    fn test_multiple_hunks_accumulate_in_order() {
        let diff = "\
--- a/m.py
+++ b/m.py
@@ -1,2 +1,3 @@
 a
+b
 c
@@ -20,2 +21,3 @@
 x
+y
 z
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("m.py").unwrap(), &[2, 22]);
    }

    #[test]
    fn test_repeated_file_sections_merge_without_duplicates() {
        let diff = "\
--- a/x.py
+++ b/x.py
@@ -1,1 +1,2 @@
 a
+b
--- a/x.py
+++ b/x.py
@@ -1,1 +1,2 @@
 a
+b
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("x.py").unwrap(), &[2]);
    }

    #[test]
    fn test_repeated_file_sections_are_sorted() {
        let diff = "\
--- a/x.py
+++ b/x.py
@@ -9,1 +9,2 @@
 a
+b
--- a/x.py
+++ b/x.py
@@ -1,1 +1,2 @@
 a
+b
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("x.py").unwrap(), &[2, 10]);
    }

    #[test]
    fn test_added_lines_strictly_increasing_within_hunk() {
        let diff = include_str!("../tests/fixtures/diffs/modified_file.diff");
        let patch = PatchSet::parse(diff).unwrap();
        for file in &patch.files {
            for hunk in &file.hunks {
                let lines = hunk.added_lines();
                assert!(lines.windows(2).all(|w| w[0] < w[1]));
                assert!(lines.iter().all(|&l| l >= hunk.target_start));
            }
        }
    }

    #[test]
    fn test_blank_context_line_without_space() {
        let diff = "--- a/e.py\n+++ b/e.py\n@@ -1,3 +1,4 @@\n a\n\n+new\n c\n";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("e.py").unwrap(), &[3]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let diff = "--- a/w.py\r\n+++ b/w.py\r\n@@ -1,1 +1,2 @@\r\n a\r\n+b\r\n";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("w.py").unwrap(), &[2]);
    }

    // -- Fixture diffs ------------------------------------------------------

    #[test]
    fn test_parse_diff() {
        let diff = include_str!("../tests/fixtures/diffs/modified_file.diff");
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.len(), 1);
        let lines = result.get("src/main.rs").unwrap();
        // Line 11 (y=2), line 12 (z=x+y), line 14 (println z)
        assert_eq!(lines, &[11, 12, 14]);
    }

    #[test]
    fn test_parse_diff_new_file() {
        let diff = include_str!("../tests/fixtures/diffs/new_file.diff");
        let result = parse_diff(diff).unwrap();
        let lines = result.get("src/new.rs").unwrap();
        assert_eq!(lines, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_diff_deleted_file() {
        let diff = include_str!("../tests/fixtures/diffs/deleted_file.diff");
        let patch = PatchSet::parse(diff).unwrap();
        assert!(patch.files[0].is_removed_file());
        assert!(patch.added_lines().is_empty());
    }

    #[test]
    fn test_parse_diff_no_newline_at_eof() {
        let diff = include_str!("../tests/fixtures/diffs/no_newline_at_eof.diff");
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.len(), 1);
        let lines = result.get("src/lib.rs").unwrap();
        // The "\ No newline at end of file" marker must not shift line numbers.
        assert_eq!(lines, &[2, 3]);
    }

    #[test]
    fn test_parse_diff_multiple_files() {
        let diff = include_str!("../tests/fixtures/diffs/multiple_files.diff");
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("a.rs").unwrap(), &[2]);
        assert_eq!(result.get("b.rs").unwrap(), &[2]);
    }

    #[test]
    fn test_parse_format_patch_with_signature() {
        let diff = include_str!("../tests/fixtures/diffs/format_patch.diff");
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("app/views.py").unwrap(), &[4, 5]);
    }

    #[test]
    fn test_removed_line_looking_like_header() {
        // "--- x" inside a hunk body is a removed line "-- x", not a header.
        let diff = "--- a/s.txt\n+++ b/s.txt\n@@ -1,2 +1,2 @@\n--- x\n+++ y\n keep\n";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.get("s.txt").unwrap(), &[1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_diff("").unwrap().is_empty());
    }

    // -- Malformed patches --------------------------------------------------

    fn assert_patch_error(diff: &str, expected_line: usize) {
        match PatchSet::parse(diff) {
            Err(DiffCovError::PatchFormat { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected PatchFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_target_header() {
        assert_patch_error("--- a/x.py\n@@ -1 +1 @@\n", 2);
        assert_patch_error("--- a/x.py", 1);
    }

    #[test]
    fn test_malformed_hunk_header() {
        assert_patch_error("--- a/x.py\n+++ b/x.py\n@@ -1,2 +x,2 @@\n", 3);
    }

    #[test]
    fn test_hunk_before_file_header() {
        assert_patch_error("@@ -1 +1 @@\n+x\n", 1);
    }

    #[test]
    fn test_truncated_hunk_at_eof() {
        assert_patch_error("--- a/x.py\n+++ b/x.py\n@@ -1,3 +1,4 @@\n a\n+b\n", 5);
    }

    #[test]
    fn test_truncated_hunk_interrupted() {
        let diff = "\
--- a/x.py
+++ b/x.py
@@ -1,3 +1,3 @@
 a
diff --git a/y.py b/y.py
";
        assert_patch_error(diff, 5);
    }

    #[test]
    fn test_hunk_overflow() {
        let diff = "--- a/x.py\n+++ b/x.py\n@@ -1,1 +1,2 @@\n a\n+b\n+c\n";
        assert_patch_error(diff, 6);
    }

    #[test]
    fn test_hunk_range_out_of_bounds() {
        let diff = "--- a/x.py\n+++ b/x.py\n@@ -1 +4294967295,2 @@\n";
        assert_patch_error(diff, 3);
    }

    #[test]
    fn test_error_aborts_whole_parse() {
        let diff = "\
--- a/ok.py
+++ b/ok.py
@@ -1,1 +1,2 @@
 a
+b
--- a/bad.py
+++ b/bad.py
@@ -1,1 +1,2 @@
 a
";
        assert!(parse_diff(diff).is_err());
    }

    // -- Path prefix --------------------------------------------------------

    #[test]
    fn test_apply_path_prefix() {
        let mut lines = BTreeMap::new();
        lines.insert("app.rs".to_string(), vec![1, 2]);
        let prefixed = apply_path_prefix(lines, "project/");
        assert_eq!(prefixed.get("project/app.rs").unwrap(), &[1, 2]);
    }
}
