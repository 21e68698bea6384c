//! Error taxonomy for the engine.
//!
//! - `ScanFailure`: fatal setup failures. A scan returning one of these never
//!   started a unit of work.
//! - `ModuleError`: registration and routing problems in the module registry.
//! - `RuleError`: data-resolution failures surfaced to editor/designer saves
//!   and ruleset binding.
//! - `DiffError`: the diff stream could not be read.
//!
//! Per-unit failures are not represented here; they become `ScanError`
//! entries inside a `Report`.

use crate::module::ScanKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
/// Fatal scan setup failure.
pub enum ScanFailure {
    #[error("cannot enumerate target '{}': {source}", path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no scanner is registered for {0} targets")]
    UnsupportedKind(ScanKind),
    #[error("scanner '{module}' handles {expected} targets and cannot be dispatched a {actual} target")]
    KindMismatch {
        module: String,
        expected: ScanKind,
        actual: ScanKind,
    },
    #[error("cannot allocate a worker pool of {threads} threads: {reason}")]
    PoolAllocation { threads: usize, reason: String },
    #[error("scanner '{module}' could not be set up: {reason}")]
    Setup { module: String, reason: String },
    #[error("ruleset cannot be bound: {0}")]
    Ruleset(#[from] RuleError),
}

#[derive(Debug, Error, PartialEq, Eq)]
/// Registry construction and routing errors.
pub enum ModuleError {
    #[error("module name '{0}' is invalid: it must be non-empty and contain no whitespace")]
    InvalidName(String),
    #[error("a module named '{0}' is already registered")]
    DuplicateModule(String),
    #[error("module '{module}' already declares a {kind} scanner")]
    DuplicateScanner { module: String, kind: ScanKind },
    #[error("module '{0}' does not declare a scanner")]
    MissingScanner(String),
    #[error("module '{module}' was given a scanner that belongs to '{scanner}'")]
    ScannerMismatch { module: String, scanner: String },
    #[error("unknown module: {0}")]
    NotFound(String),
    #[error("no scanner is registered for {0} targets")]
    NoScanner(ScanKind),
    #[error("module '{module}' scans {expected} targets, not {actual}")]
    KindMismatch {
        module: String,
        expected: ScanKind,
        actual: ScanKind,
    },
    #[error("module '{module}' has no {capability}")]
    MissingCapability {
        module: String,
        capability: &'static str,
    },
    #[error("provided ruleset is invalid: {0}")]
    Ruleset(#[from] RuleError),
}

#[derive(Debug, Error, PartialEq, Eq)]
/// Rule and ruleset resolution errors.
pub enum RuleError {
    #[error("rule with the name {name} already exists in {namespace}")]
    NameCollision { namespace: String, name: String },
    #[error("no such rule: {0}")]
    NotFound(String),
    #[error("rule '{0}' is provided by its module and cannot be modified")]
    ProvidedRule(String),
    #[error("invalid rule '{name}': {reason}")]
    Invalid { name: String, reason: String },
    #[error("unknown module: {0}")]
    ModuleNotFound(String),
    #[error("ruleset could not be parsed: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
/// Failure reading a unified diff stream.
pub enum DiffError {
    #[error("could not read diff stream: {0}")]
    Io(#[from] std::io::Error),
}
