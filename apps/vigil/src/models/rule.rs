//! Rule schema shared by every module.
//!
//! A single `Rule` type carries the common fields; module-specific data lives
//! in `RulePayload`, discriminated by kind. Modules map their own file or
//! wire formats onto this type in their interpreters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PriorityRepr", into = "String")]
/// Five-level severity, ordered highest first.
pub enum RulePriority {
    Highest,
    High,
    MediumHigh,
    Medium,
    Low,
}

impl RulePriority {
    pub const ALL: [RulePriority; 5] = [
        RulePriority::Highest,
        RulePriority::High,
        RulePriority::MediumHigh,
        RulePriority::Medium,
        RulePriority::Low,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RulePriority::Highest => "Highest",
            RulePriority::High => "High",
            RulePriority::MediumHigh => "Medium-High",
            RulePriority::Medium => "Medium",
            RulePriority::Low => "Low",
        }
    }

    /// Numeric value, 1 (highest) through 5 (lowest).
    pub fn value(&self) -> u8 {
        match self {
            RulePriority::Highest => 1,
            RulePriority::High => 2,
            RulePriority::MediumHigh => 3,
            RulePriority::Medium => 4,
            RulePriority::Low => 5,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.value() == value)
    }

    /// True when `self` is as severe as `level` or more.
    pub fn is_at_least(&self, level: RulePriority) -> bool {
        *self <= level
    }
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RulePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Self::from_value(n).ok_or_else(|| format!("priority out of range: {}", n));
        }
        let norm: String = trimmed
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match norm.as_str() {
            "highest" => Ok(RulePriority::Highest),
            "high" => Ok(RulePriority::High),
            "mediumhigh" => Ok(RulePriority::MediumHigh),
            "medium" => Ok(RulePriority::Medium),
            "low" => Ok(RulePriority::Low),
            _ => Err(format!("unknown priority: {}", s)),
        }
    }
}

impl From<RulePriority> for String {
    fn from(p: RulePriority) -> Self {
        p.name().to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriorityRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<PriorityRepr> for RulePriority {
    type Error = String;

    fn try_from(repr: PriorityRepr) -> Result<Self, Self::Error> {
        match repr {
            PriorityRepr::Number(n) => {
                Self::from_value(n).ok_or_else(|| format!("priority out of range: {}", n))
            }
            PriorityRepr::Name(s) => s.parse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
/// Module-specific rule data.
pub enum RulePayload {
    /// Line pattern matched by the regex module.
    Regex {
        pattern: String,
        /// Empty matches every file.
        file_extension: String,
    },
    /// Opaque key/value settings for modules whose evaluation lives elsewhere.
    Generic { properties: BTreeMap<String, String> },
}

impl RulePayload {
    pub fn kind(&self) -> &'static str {
        match self {
            RulePayload::Regex { .. } => "regex",
            RulePayload::Generic { .. } => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// One checkable condition owned by a module.
pub struct Rule {
    pub name: String,
    pub message: String,
    pub external_url: String,
    pub priority: RulePriority,
    pub author: String,
    /// Owning module; scanners only evaluate rules of their own module.
    pub module: String,
    /// Provided rules ship with their module and are never edited.
    pub provided: bool,
    pub payload: RulePayload,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        module: impl Into<String>,
        priority: RulePriority,
        payload: RulePayload,
    ) -> Self {
        Self {
            name: name.into(),
            message: String::new(),
            external_url: String::new(),
            priority,
            author: String::new(),
            module: module.into(),
            provided: false,
            payload,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Mark the rule as shipped by its module.
    pub fn provided(mut self) -> Self {
        self.provided = true;
        self
    }

    pub fn belongs_to(&self, module: &str) -> bool {
        self.module.eq_ignore_ascii_case(module)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// A privilege a module asks collaborators to register.
pub struct Privilege {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl Privilege {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            description: description.into(),
        }
    }
}
