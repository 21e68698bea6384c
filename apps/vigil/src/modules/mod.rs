//! Built-in modules.

pub mod regex;

use crate::error::ModuleError;
use crate::module::ModuleRegistry;

/// Registry with every built-in module registered.
pub fn default_registry() -> Result<ModuleRegistry, ModuleError> {
    let mut registry = ModuleRegistry::new();
    registry.register(regex::module()?)?;
    Ok(registry)
}
