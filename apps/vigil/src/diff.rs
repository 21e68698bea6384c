//! Line classification of unified diffs for pull-request scans.
//!
//! The classifier skips everything before the first `@@` marker, then
//! counts lines from 1: `+` lines are MODIFIED, `-` lines are dropped without
//! advancing the counter, and anything else is EXISTING. Hunk header ranges
//! are not parsed; line numbers come purely from counting.
//!
//! `HunkHeaders` selects between two counting schemes. `Skip` (the default)
//! departs from plain "anything else is EXISTING" counting in two separate
//! ways:
//! - Later `@@` headers are structural and neither recorded nor counted.
//! - `\ No newline at end of file` markers are also skipped. They carry no
//!   file line, so counting them shifts every later line number by one. This
//!   is its own rule, independent of the header handling above.
//!
//! `AsContent` keeps the older scheme: only the first header is consumed, and
//! later headers and `\` markers both count as EXISTING lines. It is kept for
//! output compatibility with reports produced that way.
//!
//! `DiffSet` splits a multi-file git diff into per-file classifications.

use crate::error::DiffError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineState {
    Modified,
    Existing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Treatment of `@@` markers after the first one.
pub enum HunkHeaders {
    #[default]
    Skip,
    AsContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    PreHunk,
    InHunk,
}

struct Classifier {
    mode: HunkHeaders,
    state: ParseState,
    next_line: usize,
    lines: BTreeMap<usize, LineState>,
}

impl Classifier {
    fn new(mode: HunkHeaders) -> Self {
        Self {
            mode,
            state: ParseState::PreHunk,
            next_line: 1,
            lines: BTreeMap::new(),
        }
    }

    fn push(&mut self, line: &str) {
        match self.state {
            ParseState::PreHunk => {
                if line.starts_with("@@") {
                    self.state = ParseState::InHunk;
                }
            }
            ParseState::InHunk => {
                if self.mode == HunkHeaders::Skip
                    && (line.starts_with("@@") || line.starts_with('\\'))
                {
                    return;
                }
                match line.as_bytes().first() {
                    Some(b'+') => self.record(LineState::Modified),
                    Some(b'-') => {}
                    // Empty lines are context lines whose leading space was trimmed.
                    _ => self.record(LineState::Existing),
                }
            }
        }
    }

    fn record(&mut self, state: LineState) {
        self.lines.insert(self.next_line, state);
        self.next_line += 1;
    }

    fn finish(self) -> DiffClassification {
        DiffClassification { lines: self.lines }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Per-line MODIFIED/EXISTING labels for one file. Absent lines were not in
/// the diff.
pub struct DiffClassification {
    lines: BTreeMap<usize, LineState>,
}

impl DiffClassification {
    pub fn parse(text: &str) -> Self {
        Self::parse_with(text, HunkHeaders::default())
    }

    pub fn parse_with(text: &str, mode: HunkHeaders) -> Self {
        let mut c = Classifier::new(mode);
        for line in text.lines() {
            c.push(line);
        }
        c.finish()
    }

    pub fn from_reader<R: BufRead>(reader: R, mode: HunkHeaders) -> Result<Self, DiffError> {
        let mut c = Classifier::new(mode);
        for line in reader.lines() {
            c.push(&line?);
        }
        Ok(c.finish())
    }

    pub fn state(&self, line: usize) -> Option<LineState> {
        self.lines.get(&line).copied()
    }

    pub fn is_line_changed(&self, line: usize) -> bool {
        self.state(line) == Some(LineState::Modified)
    }

    pub fn is_line_existing(&self, line: usize) -> bool {
        self.state(line) == Some(LineState::Existing)
    }

    pub fn has_diffs(&self) -> bool {
        !self.lines.is_empty()
    }

    pub fn modified_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines_in(LineState::Modified)
    }

    pub fn existing_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines_in(LineState::Existing)
    }

    fn lines_in(&self, wanted: LineState) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .filter(move |(_, s)| **s == wanted)
            .map(|(n, _)| *n)
    }
}

/// Classify one file's diff stream with the default header handling.
pub fn classify_diff<R: Read>(stream: R) -> Result<DiffClassification, DiffError> {
    DiffClassification::from_reader(BufReader::new(stream), HunkHeaders::default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Classifications keyed by repository-relative path.
pub struct DiffSet {
    files: BTreeMap<String, DiffClassification>,
}

impl DiffSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, diff: DiffClassification) {
        self.files.insert(normalize_path(&path.into()), diff);
    }

    pub fn get(&self, path: &str) -> Option<&DiffClassification> {
        self.files.get(&normalize_path(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Split a multi-file git diff on `diff --git` headers and classify each
    /// file section. The path comes from `+++ b/<path>` when present, else
    /// from the `diff --git` line. Deleted files (`+++ /dev/null`) are skipped.
    pub fn parse_multi(text: &str, mode: HunkHeaders) -> Self {
        let mut set = DiffSet::new();
        let mut section: Option<Section> = None;
        for line in text.lines() {
            if line.starts_with("diff --git ") {
                if let Some(s) = section.take() {
                    s.flush_into(&mut set, mode);
                }
                section = Some(Section {
                    path: parse_diff_git_line(line),
                    deleted: false,
                    lines: Vec::new(),
                    in_hunk: false,
                });
                continue;
            }
            let Some(s) = section.as_mut() else {
                continue;
            };
            if !s.in_hunk {
                if let Some(rest) = line.strip_prefix("+++ ") {
                    let target = rest.split('\t').next().unwrap_or(rest).trim();
                    if target == "/dev/null" {
                        s.deleted = true;
                    } else {
                        s.path = Some(strip_prefix_dir(target).to_string());
                    }
                    continue;
                }
                if line.starts_with("@@") {
                    s.in_hunk = true;
                }
            }
            s.lines.push(line);
        }
        if let Some(s) = section.take() {
            s.flush_into(&mut set, mode);
        }
        set
    }
}

struct Section<'a> {
    path: Option<String>,
    deleted: bool,
    lines: Vec<&'a str>,
    in_hunk: bool,
}

impl Section<'_> {
    fn flush_into(self, set: &mut DiffSet, mode: HunkHeaders) {
        if self.deleted {
            return;
        }
        let Some(path) = self.path else {
            return;
        };
        let mut c = Classifier::new(mode);
        for line in self.lines {
            c.push(line);
        }
        set.insert(path, c.finish());
    }
}

/// `diff --git a/foo b/foo` -> `foo`
fn parse_diff_git_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    let b_side = rest.rsplit(' ').next()?;
    Some(strip_prefix_dir(b_side).to_string())
}

fn strip_prefix_dir(path: &str) -> &str {
    path.strip_prefix("b/")
        .or_else(|| path.strip_prefix("a/"))
        .unwrap_or(path)
}

fn normalize_path(path: &str) -> String {
    let p = path.replace('\\', "/");
    p.strip_prefix("./").map(str::to_string).unwrap_or(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_removed_context() {
        let d = DiffClassification::parse("@@\n+ added\n- removed\n context\n");
        assert!(d.is_line_changed(1));
        assert!(!d.is_line_existing(1));
        assert!(d.is_line_existing(2));
        assert!(!d.is_line_changed(2));
        assert!(d.has_diffs());
    }

    #[test]
    fn test_removed_lines_do_not_advance() {
        let d = DiffClassification::parse("@@\n+a\n+b\n-old\n c\n");
        assert_eq!(d.modified_lines().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(d.existing_lines().collect::<Vec<_>>(), vec![3]);
        assert_eq!(d.state(4), None);
    }

    #[test]
    fn test_lines_before_first_hunk_are_skipped() {
        let text = "diff --git a/x b/x\nindex 1..2\n--- a/x\n+++ b/x\n@@ -1,2 +1,2 @@\n+new\n";
        let d = DiffClassification::parse(text);
        assert_eq!(d.modified_lines().collect::<Vec<_>>(), vec![1]);
        assert!(!d.is_line_existing(0));
    }

    #[test]
    fn test_no_hunk_means_no_diffs() {
        let d = DiffClassification::parse("--- a/x\n+++ b/x\n");
        assert!(!d.has_diffs());
        assert!(!d.is_line_changed(1));
        assert!(!d.is_line_existing(1));
    }

    #[test]
    fn test_later_hunk_headers_skipped_by_default() {
        let text = "@@ -1 +1 @@\n+a\n@@ -10 +10 @@\n c\n\\ No newline at end of file\n";
        let d = DiffClassification::parse(text);
        assert!(d.is_line_changed(1));
        assert!(d.is_line_existing(2));
        assert_eq!(d.state(3), None);
    }

    #[test]
    fn test_later_hunk_headers_counted_as_content_in_compat_mode() {
        let text = "@@ -1 +1 @@\n+a\n@@ -10 +10 @@\n c\n";
        let d = DiffClassification::parse_with(text, HunkHeaders::AsContent);
        assert!(d.is_line_changed(1));
        // The second header occupies line 2.
        assert!(d.is_line_existing(2));
        assert!(d.is_line_existing(3));
    }

    #[test]
    fn test_empty_line_in_hunk_is_existing() {
        let d = DiffClassification::parse("@@\n+a\n\n+b\n");
        assert!(d.is_line_existing(2));
        assert!(d.is_line_changed(3));
    }

    #[test]
    fn test_classify_diff_from_stream() {
        let d = classify_diff("@@\n+x\r\n y\r\n".as_bytes()).unwrap();
        assert!(d.is_line_changed(1));
        assert!(d.is_line_existing(2));
    }

    #[test]
    fn test_parse_multi_splits_files() {
        let text = "\
diff --git a/src/a.rs b/src/a.rs
index 111..222 100644
--- a/src/a.rs
+++ b/src/a.rs
@@ -1,2 +1,3 @@
 keep
+added
 keep2
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
diff --git a/docs/b.md b/docs/b.md
--- a/docs/b.md
+++ b/docs/b.md
@@ -0,0 +1 @@
+hello
";
        let set = DiffSet::parse_multi(text, HunkHeaders::Skip);
        assert_eq!(set.len(), 2);
        let a = set.get("src/a.rs").unwrap();
        assert!(a.is_line_existing(1));
        assert!(a.is_line_changed(2));
        assert!(set.get("./docs/b.md").unwrap().is_line_changed(1));
        assert!(set.get("gone.txt").is_none());
    }
}
