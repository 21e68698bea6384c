//! Mergeable scan report.
//!
//! `join` concatenates violations and errors and is the only merge
//! primitive. It is associative with `Report::default()` as identity and
//! never de-duplicates.

use crate::benchmark::Benchmarking;
use crate::models::{ScanError, Violation};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    violations: Vec<Violation>,
    errors: Vec<ScanError>,
    #[serde(skip)]
    benchmarking: Option<Arc<Benchmarking>>,
}

impl PartialEq for Report {
    fn eq(&self, other: &Self) -> bool {
        self.violations == other.violations && self.errors == other.errors
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_error(error: ScanError) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn add_error(&mut self, error: ScanError) {
        self.errors.push(error);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn errors(&self) -> &[ScanError] {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty() && self.errors.is_empty()
    }

    /// Merge `other` after `self`. Benchmarking from `self` wins when both
    /// carry one.
    pub fn join(mut self, other: Report) -> Report {
        self.absorb(other);
        self
    }

    /// In-place form of `join`.
    pub fn absorb(&mut self, other: Report) {
        self.violations.extend(other.violations);
        self.errors.extend(other.errors);
        if self.benchmarking.is_none() {
            self.benchmarking = other.benchmarking;
        }
    }

    /// Attach rule benchmarking; only meaningful when it is enabled.
    pub fn set_benchmarking(&mut self, benchmarking: Arc<Benchmarking>) {
        if benchmarking.is_enabled() {
            self.benchmarking = Some(benchmarking);
        }
    }

    pub fn benchmarking(&self) -> Option<&Benchmarking> {
        self.benchmarking.as_deref()
    }

    /// Log the benchmark report if one is attached. No-op otherwise.
    pub fn log_benchmarking(&self) -> Option<String> {
        let text = self.benchmarking.as_ref()?.report()?;
        tracing::info!("{}", text);
        Some(text)
    }

    pub fn into_parts(self) -> (Vec<Violation>, Vec<ScanError>) {
        (self.violations, self.errors)
    }
}

impl FromIterator<Report> for Report {
    fn from_iter<I: IntoIterator<Item = Report>>(iter: I) -> Self {
        iter.into_iter().fold(Report::default(), Report::join)
    }
}
