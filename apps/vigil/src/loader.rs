//! Ruleset files on disk.
//!
//! A ruleset file is TOML with an optional top-level `module` key (default
//! `regex`) naming the interpreter that parses the rest of the document, and
//! an optional `include = ["other.toml", ...]` list resolved relative to the
//! including file. Included rulesets are attached as supporting rulesets.

use crate::error::RuleError;
use crate::models::{Designation, Ruleset};
use crate::module::ModuleRegistry;
use crate::modules::regex::MODULE_NAME as DEFAULT_MODULE;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Deepest include chain accepted; longer chains are treated as cycles.
const MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
struct Header {
    module: Option<String>,
    #[serde(default)]
    include: Vec<String>,
}

/// Load and resolve the ruleset at `path`.
pub fn load_ruleset(registry: &ModuleRegistry, path: &Path) -> Result<Ruleset, RuleError> {
    load_at_depth(registry, path, 0)
}

fn load_at_depth(
    registry: &ModuleRegistry,
    path: &Path,
    depth: usize,
) -> Result<Ruleset, RuleError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(RuleError::Parse(format!(
            "include chain deeper than {} at {}",
            MAX_INCLUDE_DEPTH,
            path.display()
        )));
    }
    let text = fs::read_to_string(path)
        .map_err(|e| RuleError::NotFound(format!("{} ({})", path.display(), e)))?;
    let header: Header = toml::from_str(&text)
        .map_err(|e| RuleError::Parse(format!("{}: {}", path.display(), e)))?;
    let module = header.module.as_deref().unwrap_or(DEFAULT_MODULE);
    let interpreter = registry
        .interpreter(module)
        .map_err(|_| RuleError::ModuleNotFound(module.to_string()))?;
    let mut ruleset = interpreter.import(&text)?;
    if depth > 0 && ruleset.designation != Designation::Provided {
        ruleset.designation = Designation::Supporting;
    }

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    for inc in &header.include {
        let inc_path: PathBuf = base.join(inc);
        tracing::debug!(include = %inc_path.display(), "loading included ruleset");
        ruleset.include(load_at_depth(registry, &inc_path, depth + 1)?);
    }
    Ok(ruleset)
}
