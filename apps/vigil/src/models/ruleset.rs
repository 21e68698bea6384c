//! Ruleset schema: a named collection of rules bound to one scan.
//!
//! Rules keep insertion order and are unique by name within the set.
//! Included rulesets contribute their rules after the ruleset's own rules,
//! depth-first; the first occurrence of a name wins.

use crate::error::RuleError;
use crate::models::rule::{Rule, RulePriority};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// How a ruleset is used by collaborators.
pub enum Designation {
    Primary,
    Default,
    #[default]
    Supporting,
    Provided,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ruleset {
    pub name: String,
    pub description: String,
    pub designation: Designation,
    /// Violations at or above this priority block a pull request.
    pub blocking_level: Option<RulePriority>,
    rules: Vec<Rule>,
    includes: Vec<Ruleset>,
}

impl Ruleset {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            designation: Designation::default(),
            blocking_level: None,
            rules: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn with_designation(mut self, designation: Designation) -> Self {
        self.designation = designation;
        self
    }

    pub fn with_blocking_level(mut self, level: RulePriority) -> Self {
        self.blocking_level = Some(level);
        self
    }

    /// Add a rule, rejecting a name already present in this set.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), RuleError> {
        if self.rules.iter().any(|r| r.name == rule.name) {
            return Err(RuleError::NameCollision {
                namespace: format!("ruleset '{}'", self.name),
                name: rule.name,
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Builder form of `add_rule`.
    pub fn with_rule(mut self, rule: Rule) -> Result<Self, RuleError> {
        self.add_rule(rule)?;
        Ok(self)
    }

    pub fn include(&mut self, ruleset: Ruleset) {
        self.includes.push(ruleset);
    }

    /// Rules declared directly on this ruleset.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn includes(&self) -> &[Ruleset] {
        &self.includes
    }

    /// Flatten own and included rules, keeping the first rule of each name.
    pub fn all_rules(&self) -> Vec<&Rule> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        self.collect_rules(&mut seen, &mut out);
        out
    }

    fn collect_rules<'a>(&'a self, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a Rule>) {
        for rule in &self.rules {
            if seen.insert(rule.name.as_str()) {
                out.push(rule);
            }
        }
        for inc in &self.includes {
            inc.collect_rules(seen, out);
        }
    }

    /// Rules a scanner of `module` evaluates, in ruleset order. Rules of
    /// other modules are skipped.
    pub fn rules_for(&self, module: &str) -> Vec<&Rule> {
        self.all_rules()
            .into_iter()
            .filter(|r| r.belongs_to(module))
            .collect()
    }

    /// Map of inherited rule name to the name of the ruleset it came from.
    pub fn inherited_rules(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for inc in &self.includes {
            for rule in &inc.rules {
                out.entry(rule.name.clone())
                    .or_insert_with(|| inc.name.clone());
            }
            for (name, from) in inc.inherited_rules() {
                out.entry(name).or_insert(from);
            }
        }
        out
    }

    pub fn num_rules(&self) -> usize {
        self.all_rules().len()
    }

    pub fn is_blocking(&self, priority: RulePriority) -> bool {
        self.blocking_level
            .map(|level| priority.is_at_least(level))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::RulePayload;

    fn rule(name: &str, module: &str) -> Rule {
        Rule::new(
            name,
            module,
            RulePriority::Medium,
            RulePayload::Generic {
                properties: Default::default(),
            },
        )
    }

    #[test]
    fn test_add_rule_rejects_duplicate_name() {
        let mut rs = Ruleset::new("core", "core rules");
        rs.add_rule(rule("a", "regex")).unwrap();
        let err = rs.add_rule(rule("a", "pmd")).unwrap_err();
        assert!(matches!(err, RuleError::NameCollision { .. }));
        assert_eq!(rs.rules().len(), 1);
        assert_eq!(rs.rules()[0].module, "regex");
    }

    #[test]
    fn test_rules_for_keeps_insertion_order_and_filters_module() {
        let rs = Ruleset::new("r", "d")
            .with_rule(rule("z", "regex"))
            .unwrap()
            .with_rule(rule("m", "pmd"))
            .unwrap()
            .with_rule(rule("a", "regex"))
            .unwrap();
        let names: Vec<&str> = rs.rules_for("regex").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a"]);
    }

    #[test]
    fn test_all_rules_flattens_includes_first_wins() {
        let mut base = Ruleset::new("base", "d");
        base.add_rule(rule("shared", "pmd")).unwrap();
        base.add_rule(rule("b1", "regex")).unwrap();
        let mut top = Ruleset::new("top", "d");
        top.add_rule(rule("shared", "regex")).unwrap();
        top.include(base);

        let all = top.all_rules();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].module, "regex");
        assert_eq!(all[1].name, "b1");

        let inherited = top.inherited_rules();
        assert_eq!(inherited.get("b1").map(String::as_str), Some("base"));
        assert_eq!(top.num_rules(), 2);
    }

    #[test]
    fn test_blocking_level() {
        let rs = Ruleset::new("r", "d").with_blocking_level(RulePriority::High);
        assert!(rs.is_blocking(RulePriority::Highest));
        assert!(rs.is_blocking(RulePriority::High));
        assert!(!rs.is_blocking(RulePriority::Medium));
        assert!(!Ruleset::new("r", "d").is_blocking(RulePriority::Highest));
    }
}
