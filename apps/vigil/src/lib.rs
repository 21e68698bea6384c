//! Vigil core library.
//!
//! This crate exposes programmatic APIs for running pluggable static-analysis
//! scanners over a target, isolating per-file failures, and scoping results
//! to the lines a pull request touched.
//!
//! High-level modules:
//! - `models`: Rules, rulesets, violations, and scan errors.
//! - `module`: Scanner capability traits and the module registry.
//! - `modules`: Built-in modules (the regex code scanner).
//! - `target`: Enumeration of targets into scannable units.
//! - `processor`: Task building and sequential/concurrent execution.
//! - `report`: Mergeable scan report.
//! - `benchmark`: Optional phase and per-rule timings.
//! - `scan`: The engine routing targets to scanners.
//! - `diff`: Unified diff line classification.
//! - `scope`: Pull-request scoping of a report.
//! - `rulebook`: Rule store used by editor and designer workflows.
//! - `loader`: Ruleset files with includes.
//! - `cli`, `config`, `output`, `utils`: Binary support.
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod loader;
pub mod models;
pub mod module;
pub mod modules;
pub mod output;
pub mod processor;
pub mod report;
pub mod rulebook;
pub mod scan;
pub mod scope;
pub mod target;
pub mod utils;

pub use diff::{classify_diff, DiffClassification, DiffSet, HunkHeaders};
pub use error::{DiffError, ModuleError, RuleError, ScanFailure};
pub use models::{Rule, RulePriority, Ruleset, ScanError, Violation};
pub use module::{Module, ModuleRegistry, ScanKind, Scanner};
pub use processor::{CancelToken, Processor, Strategy, Task, TaskBuilder};
pub use report::Report;
pub use scan::{Engine, ScanOptions, ScanTarget};
