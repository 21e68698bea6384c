//! Scan orchestration.
//!
//! One `scan` call walks `Submitted -> Enumerating -> Scanning ->
//! Aggregating -> Done`. Only setup failures (no scanner for the kind,
//! unreadable target, pool allocation, scanner setup) end in `Failed`; a unit
//! that fails is recorded in the report and the call still completes.
//!
//! Each call builds fresh task builders and benchmarking, so no state carries
//! over between calls.

use crate::benchmark::{Benchmarking, Phase};
use crate::diff::DiffSet;
use crate::error::{ModuleError, ScanFailure};
use crate::models::Ruleset;
use crate::module::{ModuleRegistry, ScanKind, Scanner};
use crate::processor::{CancelToken, Processor, Strategy};
use crate::report::Report;
use crate::scope::{scope_to_diff, ScopedReport};
use crate::target::TargetSource;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Submitted,
    Enumerating,
    Scanning,
    Aggregating,
    Done,
    Failed,
}

/// A target handle and the kind of scanner it must be routed to.
pub struct ScanTarget {
    pub kind: ScanKind,
    pub source: Box<dyn TargetSource>,
}

impl ScanTarget {
    pub fn new(kind: ScanKind, source: impl TargetSource + 'static) -> Self {
        Self {
            kind,
            source: Box::new(source),
        }
    }

    pub fn code(source: impl TargetSource + 'static) -> Self {
        Self::new(ScanKind::Code, source)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub strategy: Strategy,
    pub benchmark: bool,
    pub cancel: CancelToken,
    /// Label for benchmark reports; defaults to the target description.
    pub label: Option<String>,
}

impl ScanOptions {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_benchmark(mut self, enabled: bool) -> Self {
        self.benchmark = enabled;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

pub struct Engine<'r> {
    registry: &'r ModuleRegistry,
}

fn enter(phase: ScanPhase) {
    tracing::debug!(?phase, "scan phase");
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        self.registry
    }

    /// Run every scanner bound to the target's kind and join their reports.
    pub fn scan(
        &self,
        target: &ScanTarget,
        ruleset: Arc<Ruleset>,
        options: &ScanOptions,
    ) -> Result<Report, ScanFailure> {
        enter(ScanPhase::Submitted);
        let scanners = match self.registry.resolve_scanners(target.kind) {
            Ok(s) => s,
            Err(ModuleError::NoScanner(kind)) => {
                enter(ScanPhase::Failed);
                return Err(ScanFailure::UnsupportedKind(kind));
            }
            Err(other) => {
                enter(ScanPhase::Failed);
                return Err(ScanFailure::Setup {
                    module: String::new(),
                    reason: other.to_string(),
                });
            }
        };
        let bench = self.benchmarking(target, options);
        let wall = bench.phase(Phase::WallClock);
        let mut report = Report::new();
        for scanner in scanners {
            report.absorb(self.run(scanner.as_ref(), target, ruleset.clone(), options, &bench)?);
        }
        drop(wall);
        Ok(self.finish(report, bench))
    }

    /// Run one specific scanner. A scanner is never handed a target of
    /// another kind; the mismatch is rejected before enumeration.
    pub fn scan_with(
        &self,
        scanner: &dyn Scanner,
        target: &ScanTarget,
        ruleset: Arc<Ruleset>,
        options: &ScanOptions,
    ) -> Result<Report, ScanFailure> {
        enter(ScanPhase::Submitted);
        let bench = self.benchmarking(target, options);
        let wall = bench.phase(Phase::WallClock);
        let report = self.run(scanner, target, ruleset, options, &bench)?;
        drop(wall);
        Ok(self.finish(report, bench))
    }

    /// Scan, then keep only violations in files touched by `diffs`, labelled
    /// new/pre-existing and blocking per the ruleset's blocking level.
    pub fn scan_pull_request(
        &self,
        target: &ScanTarget,
        ruleset: Arc<Ruleset>,
        diffs: &DiffSet,
        options: &ScanOptions,
    ) -> Result<ScopedReport, ScanFailure> {
        let blocking_level = ruleset.blocking_level;
        let report = self.scan(target, ruleset, options)?;
        Ok(scope_to_diff(report, diffs, blocking_level))
    }

    fn benchmarking(&self, target: &ScanTarget, options: &ScanOptions) -> Arc<Benchmarking> {
        let label = options
            .label
            .clone()
            .unwrap_or_else(|| target.source.describe());
        Arc::new(Benchmarking::new(label, options.benchmark))
    }

    fn run(
        &self,
        scanner: &dyn Scanner,
        target: &ScanTarget,
        ruleset: Arc<Ruleset>,
        options: &ScanOptions,
        bench: &Arc<Benchmarking>,
    ) -> Result<Report, ScanFailure> {
        if scanner.kind() != target.kind {
            enter(ScanPhase::Failed);
            return Err(ScanFailure::KindMismatch {
                module: scanner.module().to_string(),
                expected: scanner.kind(),
                actual: target.kind,
            });
        }
        enter(ScanPhase::Enumerating);
        let result = scanner.task_builder(bench.clone()).and_then(|builder| {
            let processor =
                Processor::new(builder.as_ref(), options.strategy).with_cancel(options.cancel.clone());
            let enumeration = target.source.enumerate()?;
            enter(ScanPhase::Scanning);
            let _scan = bench.phase(Phase::Scan);
            let mut report = Report::new();
            for e in enumeration.errors {
                report.add_error(e);
            }
            report.absorb(processor.process_units(&enumeration.units, ruleset)?);
            Ok(report)
        });
        if let Err(err) = &result {
            tracing::debug!(module = scanner.module(), "scan failed during setup: {}", err);
            enter(ScanPhase::Failed);
        }
        result
    }

    fn finish(&self, mut report: Report, bench: Arc<Benchmarking>) -> Report {
        enter(ScanPhase::Aggregating);
        {
            let _t = bench.phase(Phase::ReportGenerate);
            report.set_benchmarking(bench.clone());
        }
        report.log_benchmarking();
        enter(ScanPhase::Done);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RulePriority;
    use crate::modules::default_registry;
    use crate::modules::regex::{regex_rule, RegexScanner};
    use crate::target::{DirectorySource, UnitList};
    use std::fs;
    use tempfile::tempdir;

    fn ruleset() -> Arc<Ruleset> {
        Arc::new(
            Ruleset::new("t", "")
                .with_rule(regex_rule("todo", RulePriority::Medium, "TODO", ""))
                .unwrap(),
        )
    }

    #[test]
    fn test_scan_routes_code_target() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "// TODO\nfn x() {}\n").unwrap();
        let reg = default_registry().unwrap();
        let report = Engine::new(&reg)
            .scan(
                &ScanTarget::code(DirectorySource::new(dir.path())),
                ruleset(),
                &ScanOptions::default(),
            )
            .unwrap();
        assert_eq!(report.violations().len(), 1);
        assert!(report.benchmarking().is_none());
    }

    #[test]
    fn test_unsupported_kind_is_fatal() {
        let reg = default_registry().unwrap();
        let target = ScanTarget::new(ScanKind::Image, UnitList::default());
        let err = Engine::new(&reg)
            .scan(&target, ruleset(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanFailure::UnsupportedKind(ScanKind::Image)));
    }

    #[test]
    fn test_scan_with_rejects_mismatched_kind_before_enumeration() {
        let reg = default_registry().unwrap();
        // Enumerating this target would fail; the kind check must come first.
        let dir = tempdir().unwrap();
        let target = ScanTarget::new(ScanKind::Image, DirectorySource::new(dir.path().join("missing")));
        let err = Engine::new(&reg)
            .scan_with(&RegexScanner, &target, ruleset(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ScanFailure::KindMismatch {
                expected: ScanKind::Code,
                actual: ScanKind::Image,
                ..
            }
        ));
    }

    #[test]
    fn test_benchmark_attached_when_enabled() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "TODO\n").unwrap();
        let reg = default_registry().unwrap();
        let options = ScanOptions::default().with_benchmark(true);
        let report = Engine::new(&reg)
            .scan(&ScanTarget::code(DirectorySource::new(dir.path())), ruleset(), &options)
            .unwrap();
        let bench = report.benchmarking().unwrap();
        assert!(bench.phase_timing(Phase::WallClock).is_some());
        assert!(bench.phase_timing(Phase::Scan).is_some());
        assert_eq!(bench.rule_timings()[0].0, "todo");
    }

    #[test]
    fn test_missing_target_is_enumeration_failure() {
        let dir = tempdir().unwrap();
        let reg = default_registry().unwrap();
        let err = Engine::new(&reg)
            .scan(
                &ScanTarget::code(DirectorySource::new(dir.path().join("gone"))),
                ruleset(),
                &ScanOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, ScanFailure::Enumeration { .. }));
    }
}
