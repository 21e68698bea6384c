//! In-memory rule store backing editor and designer workflows.
//!
//! Rule names are unique per module (case-sensitive). Provided rules are
//! registered from the module registry and can never be edited; custom rules
//! are validated by their module's editor before they are stored.

use crate::error::{ModuleError, RuleError};
use crate::models::Rule;
use crate::module::ModuleRegistry;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub u64);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct RuleBook<'r> {
    registry: &'r ModuleRegistry,
    next_id: u64,
    rules: BTreeMap<RuleId, Rule>,
}

impl<'r> RuleBook<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Self {
            registry,
            next_id: 1,
            rules: BTreeMap::new(),
        }
    }

    /// Seed with every provided rule of every registered module. Rules whose
    /// name is already taken are skipped.
    pub fn with_provided_rules(mut self) -> Self {
        let provided: Vec<Rule> = self
            .registry
            .provided_rulesets()
            .into_iter()
            .flat_map(|rs| rs.rules().iter().cloned())
            .collect();
        for rule in provided {
            if self.find_by_name(&rule.module, &rule.name).is_none() {
                self.insert(rule.provided());
            }
        }
        self
    }

    fn insert(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.next_id);
        self.next_id += 1;
        self.rules.insert(id, rule);
        id
    }

    fn validate(&self, rule: &Rule) -> Result<(), RuleError> {
        let editor = self.registry.editor(&rule.module).map_err(|e| match e {
            ModuleError::NotFound(m) => RuleError::ModuleNotFound(m),
            other => RuleError::Invalid {
                name: rule.name.clone(),
                reason: other.to_string(),
            },
        })?;
        editor.validate(rule)
    }

    fn collides(&self, rule: &Rule, except: Option<RuleId>) -> Result<(), RuleError> {
        let taken = self.rules.iter().any(|(id, r)| {
            Some(*id) != except && r.belongs_to(&rule.module) && r.name == rule.name
        });
        if taken {
            return Err(RuleError::NameCollision {
                namespace: format!("module '{}'", rule.module),
                name: rule.name.clone(),
            });
        }
        Ok(())
    }

    /// Store a new custom rule. Fails without touching existing rules when
    /// the name is taken in the rule's module or the editor rejects it.
    pub fn save_new_rule(&mut self, rule: Rule) -> Result<RuleId, RuleError> {
        self.registry
            .get(&rule.module)
            .map_err(|_| RuleError::ModuleNotFound(rule.module.clone()))?;
        self.collides(&rule, None)?;
        self.validate(&rule)?;
        let mut rule = rule;
        rule.provided = false;
        let id = self.insert(rule);
        tracing::debug!(%id, "saved new rule");
        Ok(id)
    }

    /// Replace a custom rule's contents. The original author is kept.
    pub fn edit_rule(&mut self, id: RuleId, rule: Rule) -> Result<(), RuleError> {
        let existing = self
            .rules
            .get(&id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
        if existing.provided {
            return Err(RuleError::ProvidedRule(existing.name.clone()));
        }
        if !existing.belongs_to(&rule.module) {
            return Err(RuleError::Invalid {
                name: rule.name,
                reason: format!("rule cannot move from module '{}'", existing.module),
            });
        }
        self.collides(&rule, Some(id))?;
        self.validate(&rule)?;
        let author = existing.author.clone();
        let mut rule = rule;
        rule.author = author;
        rule.provided = false;
        self.rules.insert(id, rule);
        Ok(())
    }

    pub fn get_rule(&self, id: RuleId) -> Result<&Rule, RuleError> {
        self.rules
            .get(&id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))
    }

    pub fn find_by_name(&self, module: &str, name: &str) -> Option<(RuleId, &Rule)> {
        self.rules
            .iter()
            .find(|(_, r)| r.belongs_to(module) && r.name == name)
            .map(|(id, r)| (*id, r))
    }

    pub fn rules_for_module(&self, module: &str) -> Vec<(RuleId, &Rule)> {
        self.rules
            .iter()
            .filter(|(_, r)| r.belongs_to(module))
            .map(|(id, r)| (*id, r))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RulePriority;
    use crate::modules::{default_registry, regex::regex_rule};

    #[test]
    fn test_save_new_rule_rejects_collision_without_mutation() {
        let reg = default_registry().unwrap();
        let mut book = RuleBook::new(&reg);
        let id = book
            .save_new_rule(regex_rule("todo", RulePriority::Low, "TODO", "").with_message("first"))
            .unwrap();

        let err = book
            .save_new_rule(regex_rule("todo", RulePriority::High, "FIXME", "").with_message("second"))
            .unwrap_err();
        assert!(matches!(err, RuleError::NameCollision { .. }));
        let kept = book.get_rule(id).unwrap();
        assert_eq!(kept.message, "first");
        assert_eq!(kept.priority, RulePriority::Low);
        assert_eq!(book.len(), 1);

        // Names are case-sensitive.
        assert!(book
            .save_new_rule(regex_rule("TODO", RulePriority::Low, "TODO", ""))
            .is_ok());
    }

    #[test]
    fn test_save_new_rule_validates_and_checks_module() {
        let reg = default_registry().unwrap();
        let mut book = RuleBook::new(&reg);
        let bad = regex_rule("bad", RulePriority::Low, "(", "");
        assert!(matches!(
            book.save_new_rule(bad),
            Err(RuleError::Invalid { .. })
        ));
        let mut orphan = regex_rule("x", RulePriority::Low, "x", "");
        orphan.module = "pmd".into();
        assert_eq!(
            book.save_new_rule(orphan),
            Err(RuleError::ModuleNotFound("pmd".into()))
        );
        assert!(book.is_empty());
    }

    #[test]
    fn test_edit_rule_rename_collision_and_author() {
        let reg = default_registry().unwrap();
        let mut book = RuleBook::new(&reg);
        let a = book
            .save_new_rule(regex_rule("a", RulePriority::Low, "a", "").with_author("alice"))
            .unwrap();
        book.save_new_rule(regex_rule("b", RulePriority::Low, "b", ""))
            .unwrap();

        let err = book
            .edit_rule(a, regex_rule("b", RulePriority::Low, "z", ""))
            .unwrap_err();
        assert!(matches!(err, RuleError::NameCollision { .. }));
        assert_eq!(book.get_rule(a).unwrap().name, "a");

        book.edit_rule(a, regex_rule("a2", RulePriority::High, "a+", "").with_author("mallory"))
            .unwrap();
        let edited = book.get_rule(a).unwrap();
        assert_eq!(edited.name, "a2");
        assert_eq!(edited.author, "alice");

        assert!(matches!(
            book.edit_rule(RuleId(99), regex_rule("q", RulePriority::Low, "q", "")),
            Err(RuleError::NotFound(_))
        ));
    }

    #[test]
    fn test_provided_rules_are_immutable() {
        let reg = default_registry().unwrap();
        let mut book = RuleBook::new(&reg).with_provided_rules();
        let (id, rule) = book.find_by_name("regex", "AWS Access Key").unwrap();
        assert!(rule.provided);
        let err = book
            .edit_rule(id, regex_rule("AWS Access Key", RulePriority::Low, "x", ""))
            .unwrap_err();
        assert!(matches!(err, RuleError::ProvidedRule(_)));
        assert!(!book.rules_for_module("regex").is_empty());
    }
}
