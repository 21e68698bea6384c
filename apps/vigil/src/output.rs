//! Output rendering for scan, module, and ruleset commands.
//!
//! Supports `human` (default), `json`, and for pull-request scans
//! `markdown`. The JSON forms include a top-level summary.

use crate::models::{RulePayload, RulePriority, Ruleset};
use crate::module::ModuleRegistry;
use crate::report::Report;
use crate::scope::ScopedReport;
use crate::utils::use_colors;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn print_json(value: &JsonVal) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("{} {}", crate::utils::error_prefix(), e),
    }
}

fn severity_tag(p: RulePriority, color: bool) -> String {
    let tag = format!("⟦{}⟧", p.name().to_lowercase());
    if !color {
        return tag;
    }
    match p {
        RulePriority::Highest | RulePriority::High => tag.red().bold().to_string(),
        RulePriority::MediumHigh | RulePriority::Medium => tag.yellow().bold().to_string(),
        RulePriority::Low => tag.blue().bold().to_string(),
    }
}

/// Print a full scan report.
pub fn print_report(report: &Report, output: &str) {
    if output == "json" {
        print_json(&compose_report_json(report));
        return;
    }
    let color = use_colors(output);
    for v in report.violations() {
        let loc = format!("{}:{}", v.file, v.line);
        let loc = if color { loc.bold().to_string() } else { loc };
        println!(
            "{} {} ❲{}❳ — {}",
            severity_tag(v.severity, color),
            loc,
            v.rule_name,
            v.message
        );
    }
    for e in report.errors() {
        let tag = if color {
            "⟦error⟧".red().to_string()
        } else {
            "⟦error⟧".to_string()
        };
        println!("{} {}", tag, e.message);
    }
    let summary = format!(
        "— Summary — violations={} errors={}",
        report.violations().len(),
        report.errors().len()
    );
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary);
    }
}

/// Print a pull-request scoped report.
pub fn print_scoped(scoped: &ScopedReport, output: &str) {
    match output {
        "json" => print_json(&compose_scoped_json(scoped)),
        "markdown" => print!("{}", scoped.to_markdown()),
        _ => {
            let color = use_colors(output);
            for sv in &scoped.violations {
                let v = &sv.violation;
                let state = match (sv.new, sv.blocking) {
                    (true, true) => "new, blocking",
                    (true, false) => "new",
                    _ => "existing",
                };
                let state = if color && sv.blocking {
                    state.red().bold().to_string()
                } else if color && !sv.new {
                    state.bright_black().to_string()
                } else {
                    state.to_string()
                };
                println!(
                    "{} {}:{} ❲{}❳ ({}) — {}",
                    severity_tag(v.severity, color),
                    v.file,
                    v.line,
                    v.rule_name,
                    state,
                    v.message
                );
            }
            for e in &scoped.errors {
                println!("⟦error⟧ {}", e.message);
            }
            let summary = format!(
                "— Summary — new={} existing={} blocking={} errors={}",
                scoped.new_violations().count(),
                scoped.existing_violations().count(),
                scoped.violations.iter().filter(|v| v.blocking).count(),
                scoped.errors.len()
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print registered modules and their capabilities.
pub fn print_modules(registry: &ModuleRegistry, output: &str) {
    if output == "json" {
        print_json(&compose_modules_json(registry));
        return;
    }
    let color = use_colors(output);
    for m in registry.modules() {
        let caps: Vec<&str> = [
            m.designer().map(|_| "designer"),
            m.editor().map(|_| "editor"),
            m.interpreter().map(|_| "interpreter"),
        ]
        .into_iter()
        .flatten()
        .collect();
        let name = if color {
            m.name().bold().to_string()
        } else {
            m.name().to_string()
        };
        println!("{} [{}] {}", name, m.kind(), caps.join(", "));
        for p in m.privileges() {
            println!("  privilege: {} ({})", p.name, p.category);
        }
        for rs in m.provided_rulesets() {
            println!("  provided ruleset: {} ({} rules)", rs.name, rs.num_rules());
        }
    }
}

/// Print the rules a ruleset binds, noting where inherited rules come from.
pub fn print_ruleset(ruleset: &Ruleset, output: &str) {
    if output == "json" {
        print_json(&compose_ruleset_json(ruleset));
        return;
    }
    let color = use_colors(output);
    let title = format!("{} — {}", ruleset.name, ruleset.description);
    if color {
        println!("{}", title.bold());
    } else {
        println!("{}", title);
    }
    let inherited = ruleset.inherited_rules();
    for r in ruleset.all_rules() {
        let from = inherited
            .get(&r.name)
            .map(|src| format!(" (from {})", src))
            .unwrap_or_default();
        println!(
            "  {} {} [{}]{}",
            severity_tag(r.priority, color),
            r.name,
            r.module,
            from
        );
    }
}

/// Compose scan report JSON (pure) for testing/snapshot purposes.
pub fn compose_report_json(report: &Report) -> JsonVal {
    json!({
        "violations": report.violations(),
        "errors": report.errors(),
        "summary": {
            "violations": report.violations().len(),
            "errors": report.errors().len(),
        },
    })
}

/// Compose scoped report JSON (pure) for testing/snapshot purposes.
pub fn compose_scoped_json(scoped: &ScopedReport) -> JsonVal {
    json!({
        "violations": scoped.violations,
        "errors": scoped.errors,
        "summary": {
            "new": scoped.new_violations().count(),
            "existing": scoped.existing_violations().count(),
            "blocking": scoped.violations.iter().filter(|v| v.blocking).count(),
            "errors": scoped.errors.len(),
        },
    })
}

pub fn compose_modules_json(registry: &ModuleRegistry) -> JsonVal {
    let items: Vec<_> = registry
        .modules()
        .map(|m| {
            json!({
                "name": m.name(),
                "kind": m.kind(),
                "designer": m.designer().is_some(),
                "editor": m.editor().is_some(),
                "interpreter": m.interpreter().is_some(),
                "privileges": m.privileges(),
                "schema_history_table": m.schema_history_table(),
                "migrations_location": m.migrations_location(),
                "provided_rulesets": m.provided_rulesets().iter().map(|r| &r.name).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({ "modules": items })
}

pub fn compose_ruleset_json(ruleset: &Ruleset) -> JsonVal {
    let inherited = ruleset.inherited_rules();
    let rules: Vec<_> = ruleset
        .all_rules()
        .into_iter()
        .map(|r| {
            let pattern = match &r.payload {
                RulePayload::Regex { pattern, .. } => Some(pattern.as_str()),
                RulePayload::Generic { .. } => None,
            };
            json!({
                "name": r.name,
                "module": r.module,
                "priority": r.priority,
                "pattern": pattern,
                "inherited_from": inherited.get(&r.name),
            })
        })
        .collect();
    json!({
        "name": ruleset.name,
        "description": ruleset.description,
        "designation": ruleset.designation,
        "blocking_level": ruleset.blocking_level,
        "rules": rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffClassification, DiffSet};
    use crate::models::{ScanError, Violation};
    use crate::modules::{default_registry, regex::regex_rule};
    use crate::scope::scope_to_diff;

    fn report() -> Report {
        let mut r = Report::new();
        r.add_violation(Violation {
            rule_name: "aws".into(),
            severity: RulePriority::Highest,
            file: "src/a.rs".into(),
            line: 2,
            message: "key".into(),
            external_url: String::new(),
        });
        r.add_error(ScanError::new("Could not read: b.rs"));
        r
    }

    #[test]
    fn test_compose_report_json_shape() {
        let out = compose_report_json(&report());
        assert_eq!(out["summary"]["violations"], 1);
        assert_eq!(out["summary"]["errors"], 1);
        assert_eq!(out["violations"][0]["rule_name"], "aws");
        assert_eq!(out["violations"][0]["severity"], "Highest");
        assert_eq!(out["errors"][0]["message"], "Could not read: b.rs");
    }

    #[test]
    fn test_compose_scoped_json_summary() {
        let mut diffs = DiffSet::new();
        diffs.insert("src/a.rs", DiffClassification::parse("@@\n ctx\n+added\n"));
        let scoped = scope_to_diff(report(), &diffs, Some(RulePriority::High));
        let out = compose_scoped_json(&scoped);
        assert_eq!(out["summary"]["new"], 1);
        assert_eq!(out["summary"]["blocking"], 1);
        assert_eq!(out["violations"][0]["blocking"], true);
    }

    #[test]
    fn test_compose_modules_and_ruleset_json() {
        let reg = default_registry().unwrap();
        let out = compose_modules_json(&reg);
        assert_eq!(out["modules"][0]["name"], "regex");
        assert_eq!(out["modules"][0]["kind"], "code");
        assert_eq!(out["modules"][0]["interpreter"], true);

        let mut base = Ruleset::new("base", "");
        base.add_rule(regex_rule("b", RulePriority::Low, "b", "")).unwrap();
        let mut top = Ruleset::new("top", "d");
        top.add_rule(regex_rule("a", RulePriority::High, "a", "")).unwrap();
        top.include(base);
        let out = compose_ruleset_json(&top);
        assert_eq!(out["rules"][0]["name"], "a");
        assert!(out["rules"][0]["inherited_from"].is_null());
        assert_eq!(out["rules"][1]["inherited_from"], "base");
        assert_eq!(out["rules"][1]["pattern"], "b");
    }
}
