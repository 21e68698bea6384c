//! Shared data models: rules, rulesets, and the per-line scan outcomes
//! collected into a `Report`.

pub mod rule;
pub mod ruleset;

pub use rule::{Privilege, Rule, RulePayload, RulePriority};
pub use ruleset::{Designation, Ruleset};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// A matched rule at a specific file and line.
pub struct Violation {
    pub rule_name: String,
    pub severity: RulePriority,
    pub file: String,
    pub line: usize,
    pub message: String,
    pub external_url: String,
}

impl Violation {
    pub fn from_rule(rule: &Rule, file: impl Into<String>, line: usize) -> Self {
        Self {
            rule_name: rule.name.clone(),
            severity: rule.priority,
            file: file.into(),
            line,
            message: rule.message.clone(),
            external_url: rule.external_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// One unit of work's unrecoverable failure.
pub struct ScanError {
    pub message: String,
}

impl ScanError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
