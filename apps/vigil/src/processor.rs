//! Task building and execution.
//!
//! A `TaskBuilder` binds one `ScanUnit` to the scan's ruleset and returns a
//! deferred `Task`. The `Processor` builds every task up front, so a
//! setup failure aborts the scan before any unit runs. It then executes the
//! tasks with the chosen `Strategy` and folds the per-unit reports with
//! `Report::join`.
//!
//! Failure isolation: a task that returns `Err` or panics contributes exactly
//! one `ScanError` and never affects its siblings.
//!
//! Concurrent execution uses a fixed set of workers on a rayon pool fed from
//! a bounded crossbeam channel. The calling thread feeds the queue and drains
//! results; the drain ends only after every worker has exited, which is the
//! barrier for the call.

use crate::error::ScanFailure;
use crate::models::{Ruleset, ScanError};
use crate::report::Report;
use crate::target::{ScanUnit, TargetSource};
use crossbeam_channel::{bounded, unbounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Jobs queued per worker before the feeder blocks.
const QUEUE_DEPTH: usize = 4;

/// One deferred unit of work.
pub type Task = Box<dyn FnOnce() -> anyhow::Result<Report> + Send + 'static>;

/// Binds units to a ruleset. Implementations must not do per-unit I/O here;
/// returning `Err` means the scanner itself cannot be prepared.
pub trait TaskBuilder: Send + Sync {
    fn build_task(&self, unit: &ScanUnit, ruleset: &Arc<Ruleset>) -> Result<Task, ScanFailure>;
}

impl<F> TaskBuilder for F
where
    F: Fn(&ScanUnit, &Arc<Ruleset>) -> Result<Task, ScanFailure> + Send + Sync,
{
    fn build_task(&self, unit: &ScanUnit, ruleset: &Arc<Ruleset>) -> Result<Task, ScanFailure> {
        self(unit, ruleset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Enumeration order, on the calling thread.
    #[default]
    Sequential,
    /// Bounded worker pool; completion order is unspecified.
    Concurrent { threads: usize },
}

impl Strategy {
    /// `0` selects the sequential strategy.
    pub fn from_threads(threads: usize) -> Self {
        if threads == 0 {
            Strategy::Sequential
        } else {
            Strategy::Concurrent { threads }
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Cooperative cancellation shared between a caller and one scan.
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Processor<'a> {
    builder: &'a dyn TaskBuilder,
    strategy: Strategy,
    cancel: CancelToken,
}

impl<'a> Processor<'a> {
    pub fn new(builder: &'a dyn TaskBuilder, strategy: Strategy) -> Self {
        Self {
            builder,
            strategy,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Enumerate `target`, then build and run one task per unit.
    /// Enumeration errors below the root are carried into the report.
    pub fn process(
        &self,
        target: &dyn TargetSource,
        ruleset: Arc<Ruleset>,
    ) -> Result<Report, ScanFailure> {
        let enumeration = target.enumerate()?;
        let mut report = Report::new();
        for e in enumeration.errors {
            report.add_error(e);
        }
        report.absorb(self.process_units(&enumeration.units, ruleset)?);
        Ok(report)
    }

    pub fn process_units(
        &self,
        units: &[ScanUnit],
        ruleset: Arc<Ruleset>,
    ) -> Result<Report, ScanFailure> {
        // Allocate first: a bad pool size must fail before any setup work.
        let pool = match self.strategy {
            Strategy::Sequential => None,
            Strategy::Concurrent { threads } => Some(build_pool(threads)?),
        };
        let tasks = units
            .iter()
            .map(|u| Ok((u.name.clone(), self.builder.build_task(u, &ruleset)?)))
            .collect::<Result<Vec<_>, ScanFailure>>()?;

        Ok(match pool {
            None => self.run_sequential(tasks),
            Some((pool, threads)) => self.run_concurrent(&pool, threads, tasks),
        })
    }

    fn run_sequential(&self, tasks: Vec<(String, Task)>) -> Report {
        let mut report = Report::new();
        for (name, task) in tasks {
            if self.cancel.is_cancelled() {
                tracing::debug!("cancelled; remaining units not started");
                break;
            }
            report.absorb(run_isolated(&name, task));
        }
        report
    }

    fn run_concurrent(
        &self,
        pool: &rayon::ThreadPool,
        threads: usize,
        tasks: Vec<(String, Task)>,
    ) -> Report {
        let (job_tx, job_rx) = bounded::<(String, Task)>(threads * QUEUE_DEPTH);
        let (done_tx, done_rx) = unbounded::<Report>();

        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let cancel = self.cancel.clone();
            pool.spawn(move || {
                for (name, task) in job_rx.iter() {
                    if cancel.is_cancelled() {
                        continue;
                    }
                    if done_tx.send(run_isolated(&name, task)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(done_tx);

        for job in tasks {
            if self.cancel.is_cancelled() {
                tracing::debug!("cancelled; remaining units not queued");
                break;
            }
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);

        // Ends once every worker has dropped its sender.
        done_rx.iter().collect()
    }
}

fn build_pool(threads: usize) -> Result<(rayon::ThreadPool, usize), ScanFailure> {
    if threads == 0 {
        return Err(ScanFailure::PoolAllocation {
            threads,
            reason: "pool size must be at least 1".into(),
        });
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("processor-{}", i + 1))
        .build()
        .map(|pool| (pool, threads))
        .map_err(|e| ScanFailure::PoolAllocation {
            threads,
            reason: e.to_string(),
        })
}

/// Run one task, turning an `Err` or a panic into a single `ScanError`.
pub fn run_isolated(unit: &str, task: Task) -> Report {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => failed(unit, format!("{:#}", err)),
        Err(payload) => failed(unit, panic_message(payload.as_ref())),
    }
}

fn failed(unit: &str, msg: String) -> Report {
    tracing::warn!(unit, "unit failed: {}", msg);
    Report::from_error(ScanError::new(format!("Exception: {}", msg)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
