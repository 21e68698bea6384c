//! Module registry and scanner capabilities.
//!
//! A `Module` bundles exactly one `Scanner` with optional designer, editor,
//! and interpreter capabilities. The `ModuleRegistry` is built once at
//! startup and passed by reference; it is read-only afterwards.
//!
//! Routing is static: a scanner is only ever handed targets of the kind it
//! declares, and mismatches are rejected before any unit is built.

use crate::benchmark::Benchmarking;
use crate::error::{ModuleError, RuleError, ScanFailure};
use crate::models::{Privilege, Rule, Ruleset};
use crate::processor::TaskBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Target kind a scanner is bound to.
pub enum ScanKind {
    Code,
    Image,
    Scm,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Code => "code",
            ScanKind::Image => "image",
            ScanKind::Scm => "scm",
        }
    }
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(ScanKind::Code),
            "image" => Ok(ScanKind::Image),
            "scm" => Ok(ScanKind::Scm),
            other => Err(format!("unknown scan kind: {} (expected code|image|scm)", other)),
        }
    }
}

/// Evaluation capability of a module.
pub trait Scanner: Send + Sync {
    /// Name of the owning module; only rules of this module are evaluated.
    fn module(&self) -> &str;

    fn kind(&self) -> ScanKind;

    /// Prepare a task builder for one scan. Errors here are fatal setup
    /// failures for the whole call.
    fn task_builder(
        &self,
        benchmarking: Arc<Benchmarking>,
    ) -> Result<Box<dyn TaskBuilder>, ScanFailure>;
}

/// Rules of `ruleset` that `scanner` evaluates, in ruleset order.
pub fn rules_for<'a>(scanner: &dyn Scanner, ruleset: &'a Ruleset) -> Vec<&'a Rule> {
    ruleset.rules_for(scanner.module())
}

/// Interactive rule authoring: try a query against sample source.
pub trait RuleDesigner: Send + Sync {
    fn query(&self, query: &str, source: &str) -> Vec<String>;

    fn privilege(&self) -> Option<Privilege> {
        None
    }
}

/// Validation of module-specific rule payloads before they are saved.
pub trait RuleEditor: Send + Sync {
    fn validate(&self, rule: &Rule) -> Result<(), RuleError>;

    fn privilege(&self) -> Option<Privilege> {
        None
    }
}

/// Import/export of rulesets in a module's native format.
pub trait RulesetInterpreter: Send + Sync {
    fn import(&self, text: &str) -> Result<Ruleset, RuleError>;

    /// `None` when the ruleset has nothing for this module.
    fn export(&self, ruleset: &Ruleset) -> Result<Option<String>, RuleError>;

    fn example(&self) -> Ruleset;
}

pub struct Module {
    name: String,
    scanner: Arc<dyn Scanner>,
    designer: Option<Arc<dyn RuleDesigner>>,
    editor: Option<Arc<dyn RuleEditor>>,
    interpreter: Option<Arc<dyn RulesetInterpreter>>,
    privileges: Vec<Privilege>,
    schema_history_table: String,
    migrations_location: String,
    provided_rulesets: Vec<Ruleset>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("kind", &self.scanner.kind())
            .field("designer", &self.designer.is_some())
            .field("editor", &self.editor.is_some())
            .field("interpreter", &self.interpreter.is_some())
            .finish()
    }
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            scanner: None,
            duplicate_scanner: None,
            designer: None,
            editor: None,
            interpreter: None,
            privileges: Vec::new(),
            schema_history_table: None,
            migrations_location: None,
            provided_rulesets: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ScanKind {
        self.scanner.kind()
    }

    pub fn scanner(&self) -> &Arc<dyn Scanner> {
        &self.scanner
    }

    pub fn designer(&self) -> Option<&Arc<dyn RuleDesigner>> {
        self.designer.as_ref()
    }

    pub fn editor(&self) -> Option<&Arc<dyn RuleEditor>> {
        self.editor.as_ref()
    }

    pub fn interpreter(&self) -> Option<&Arc<dyn RulesetInterpreter>> {
        self.interpreter.as_ref()
    }

    /// Declared privileges plus those requested by the designer and editor.
    pub fn privileges(&self) -> Vec<Privilege> {
        let mut out = self.privileges.clone();
        let extra = [
            self.designer.as_ref().and_then(|d| d.privilege()),
            self.editor.as_ref().and_then(|e| e.privilege()),
        ];
        for p in extra.into_iter().flatten() {
            if !out.iter().any(|have| have.name == p.name) {
                out.push(p);
            }
        }
        out
    }

    pub fn schema_history_table(&self) -> &str {
        &self.schema_history_table
    }

    pub fn migrations_location(&self) -> &str {
        &self.migrations_location
    }

    pub fn provided_rulesets(&self) -> &[Ruleset] {
        &self.provided_rulesets
    }
}

/// Collects a module's capabilities; `build` enforces the one-scanner rule.
pub struct ModuleBuilder {
    name: String,
    scanner: Option<Arc<dyn Scanner>>,
    duplicate_scanner: Option<ScanKind>,
    designer: Option<Arc<dyn RuleDesigner>>,
    editor: Option<Arc<dyn RuleEditor>>,
    interpreter: Option<Arc<dyn RulesetInterpreter>>,
    privileges: Vec<Privilege>,
    schema_history_table: Option<String>,
    migrations_location: Option<String>,
    provided_rulesets: Vec<Ruleset>,
}

impl ModuleBuilder {
    pub fn scanner(mut self, scanner: impl Scanner + 'static) -> Self {
        if self.scanner.is_some() {
            self.duplicate_scanner.get_or_insert(scanner.kind());
        } else {
            self.scanner = Some(Arc::new(scanner));
        }
        self
    }

    pub fn designer(mut self, designer: impl RuleDesigner + 'static) -> Self {
        self.designer = Some(Arc::new(designer));
        self
    }

    pub fn editor(mut self, editor: impl RuleEditor + 'static) -> Self {
        self.editor = Some(Arc::new(editor));
        self
    }

    pub fn interpreter(mut self, interpreter: impl RulesetInterpreter + 'static) -> Self {
        self.interpreter = Some(Arc::new(interpreter));
        self
    }

    pub fn privilege(mut self, privilege: Privilege) -> Self {
        self.privileges.push(privilege);
        self
    }

    pub fn schema_history_table(mut self, table: impl Into<String>) -> Self {
        self.schema_history_table = Some(table.into());
        self
    }

    pub fn migrations_location(mut self, location: impl Into<String>) -> Self {
        self.migrations_location = Some(location.into());
        self
    }

    pub fn provided_ruleset(mut self, ruleset: Ruleset) -> Self {
        self.provided_rulesets.push(ruleset);
        self
    }

    pub fn build(self) -> Result<Module, ModuleError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(ModuleError::InvalidName(self.name));
        }
        if let Some(kind) = self.duplicate_scanner {
            return Err(ModuleError::DuplicateScanner {
                module: self.name,
                kind,
            });
        }
        let scanner = self
            .scanner
            .ok_or_else(|| ModuleError::MissingScanner(self.name.clone()))?;
        if !scanner.module().eq_ignore_ascii_case(&self.name) {
            return Err(ModuleError::ScannerMismatch {
                module: self.name,
                scanner: scanner.module().to_string(),
            });
        }
        let lower = self.name.to_ascii_lowercase();
        Ok(Module {
            schema_history_table: self
                .schema_history_table
                .unwrap_or_else(|| format!("{}_schema_history", lower)),
            migrations_location: self
                .migrations_location
                .unwrap_or_else(|| format!("db/{}", lower)),
            name: self.name,
            scanner,
            designer: self.designer,
            editor: self.editor,
            interpreter: self.interpreter,
            privileges: self.privileges,
            provided_rulesets: self.provided_rulesets,
        })
    }
}

#[derive(Debug, Default)]
/// Active modules keyed by lower-cased name.
pub struct ModuleRegistry {
    modules: BTreeMap<String, Module>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Module) -> Result<(), ModuleError> {
        let key = module.name.to_ascii_lowercase();
        if self.modules.contains_key(&key) {
            return Err(ModuleError::DuplicateModule(module.name));
        }
        tracing::info!(module = %module.name, kind = %module.kind(), "building module");
        self.modules.insert(key, module);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Module, ModuleError> {
        self.modules
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ModuleError::NotFound(name.to_string()))
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Scanner of `module`, provided it handles `kind` targets.
    pub fn resolve_scanner(
        &self,
        module: &str,
        kind: ScanKind,
    ) -> Result<&Arc<dyn Scanner>, ModuleError> {
        let m = self.get(module)?;
        if m.kind() != kind {
            return Err(ModuleError::KindMismatch {
                module: m.name.clone(),
                expected: m.kind(),
                actual: kind,
            });
        }
        Ok(&m.scanner)
    }

    /// Every scanner bound to `kind`, in module-name order.
    pub fn resolve_scanners(&self, kind: ScanKind) -> Result<Vec<&Arc<dyn Scanner>>, ModuleError> {
        let found: Vec<_> = self
            .modules
            .values()
            .filter(|m| m.kind() == kind)
            .map(|m| &m.scanner)
            .collect();
        if found.is_empty() {
            return Err(ModuleError::NoScanner(kind));
        }
        Ok(found)
    }

    pub fn provided_rulesets(&self) -> Vec<&Ruleset> {
        self.modules
            .values()
            .flat_map(|m| m.provided_rulesets.iter())
            .collect()
    }

    /// Privileges of all modules, de-duplicated by name.
    pub fn privileges(&self) -> Vec<Privilege> {
        let mut out: Vec<Privilege> = Vec::new();
        for p in self.modules.values().flat_map(Module::privileges) {
            if !out.iter().any(|have| have.name == p.name) {
                out.push(p);
            }
        }
        out
    }

    pub fn designer(&self, module: &str) -> Result<&Arc<dyn RuleDesigner>, ModuleError> {
        let m = self.get(module)?;
        m.designer.as_ref().ok_or(ModuleError::MissingCapability {
            module: m.name.clone(),
            capability: "rule designer",
        })
    }

    pub fn editor(&self, module: &str) -> Result<&Arc<dyn RuleEditor>, ModuleError> {
        let m = self.get(module)?;
        m.editor.as_ref().ok_or(ModuleError::MissingCapability {
            module: m.name.clone(),
            capability: "rule editor",
        })
    }

    pub fn interpreter(&self, module: &str) -> Result<&Arc<dyn RulesetInterpreter>, ModuleError> {
        let m = self.get(module)?;
        m.interpreter.as_ref().ok_or(ModuleError::MissingCapability {
            module: m.name.clone(),
            capability: "ruleset interpreter",
        })
    }
}
