//! Pull-request scoping of a scan report.
//!
//! Only files touched by the diff are kept. A kept violation is `new` when
//! its line was added by the change, and `blocking` when it is new and at or
//! above the ruleset's blocking level. Pre-existing issues never block.

use crate::diff::DiffSet;
use crate::models::{RulePriority, ScanError, Violation};
use crate::report::Report;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedViolation {
    #[serde(flatten)]
    pub violation: Violation,
    pub new: bool,
    pub blocking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopedReport {
    pub violations: Vec<ScopedViolation>,
    pub errors: Vec<ScanError>,
}

impl ScopedReport {
    pub fn new_violations(&self) -> impl Iterator<Item = &ScopedViolation> {
        self.violations.iter().filter(|v| v.new)
    }

    pub fn existing_violations(&self) -> impl Iterator<Item = &ScopedViolation> {
        self.violations.iter().filter(|v| !v.new)
    }

    pub fn has_blocking(&self) -> bool {
        self.violations.iter().any(|v| v.blocking)
    }

    /// Markdown summary suitable for a pull-request comment.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("## Vigil Report\n\n");
        let new: Vec<_> = self.new_violations().collect();
        let existing: Vec<_> = self.existing_violations().collect();
        if new.is_empty() && existing.is_empty() {
            out.push_str("No issues found in the changed files.\n");
        }
        if !new.is_empty() {
            out.push_str("### Issues added in this Pull Request\n\n");
            for v in new {
                write_violation(&mut out, v);
            }
        }
        if !existing.is_empty() {
            out.push_str("### Pre-existing issues\n\n");
            for v in existing {
                write_violation(&mut out, v);
            }
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "### Errors ({})\n", self.errors.len());
            for e in &self.errors {
                let _ = writeln!(out, "- {}", e.message);
            }
        }
        out
    }
}

fn write_violation(out: &mut String, v: &ScopedViolation) {
    let vio = &v.violation;
    let blocking = if v.blocking { " BLOCKING" } else { "" };
    let _ = writeln!(out, "- **{}**", vio.rule_name);
    let _ = writeln!(out, "  - Severity: {}{}", vio.severity, blocking);
    let _ = writeln!(out, "  - File: `{}`", vio.file);
    let _ = writeln!(out, "  - Line: {}", vio.line);
    if vio.external_url.is_empty() {
        let _ = writeln!(out, "  - Description: {}", vio.message);
    } else {
        let _ = writeln!(out, "  - Description: {} ([details]({}))", vio.message, vio.external_url);
    }
    out.push('\n');
}

/// Keep violations in touched files and label them new/blocking. Output is
/// sorted by file, line, then rule name; errors are carried unchanged.
pub fn scope_to_diff(
    report: Report,
    diffs: &DiffSet,
    blocking_level: Option<RulePriority>,
) -> ScopedReport {
    let (violations, errors) = report.into_parts();
    let mut scoped: Vec<ScopedViolation> = violations
        .into_iter()
        .filter_map(|violation| {
            let diff = diffs.get(&violation.file)?;
            if !diff.has_diffs() {
                return None;
            }
            let new = diff.is_line_changed(violation.line);
            let blocking = new
                && blocking_level
                    .map(|level| violation.severity.is_at_least(level))
                    .unwrap_or(false);
            Some(ScopedViolation {
                violation,
                new,
                blocking,
            })
        })
        .collect();
    scoped.sort_by(|a, b| {
        (&a.violation.file, a.violation.line, &a.violation.rule_name).cmp(&(
            &b.violation.file,
            b.violation.line,
            &b.violation.rule_name,
        ))
    });
    ScopedReport {
        violations: scoped,
        errors,
    }
}
