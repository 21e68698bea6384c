//! Optional timing of scan phases and individual rules.
//!
//! A disabled `Benchmarking` hands out no-op timers, so scanners can time
//! unconditionally. Timers record on drop.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Coarse phases of one scan call.
pub enum Phase {
    WallClock,
    Scan,
    ReportGenerate,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::WallClock => "Wall Clock",
            Phase::Scan => "Scan",
            Phase::ReportGenerate => "Report Generate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Accumulated time and call count for one timer.
pub struct Benchmark {
    pub total: Duration,
    pub calls: u64,
}

impl Benchmark {
    fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.calls += 1;
    }
}

#[derive(Debug, Default)]
pub struct Benchmarking {
    label: String,
    enabled: bool,
    phases: Mutex<BTreeMap<Phase, Benchmark>>,
    rules: Mutex<BTreeMap<String, Benchmark>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Benchmarking {
    pub fn new(label: impl Into<String>, enabled: bool) -> Self {
        Self {
            label: label.into(),
            enabled,
            ..Default::default()
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn phase(&self, phase: Phase) -> Timer<'_> {
        if !self.enabled {
            return Timer::nop();
        }
        Timer {
            slot: Slot::Phase(self, phase),
            started: Instant::now(),
        }
    }

    pub fn rule(&self, rule_name: &str) -> Timer<'_> {
        if !self.enabled {
            return Timer::nop();
        }
        Timer {
            slot: Slot::Rule(self, rule_name.to_string()),
            started: Instant::now(),
        }
    }

    pub fn phase_timing(&self, phase: Phase) -> Option<Benchmark> {
        lock(&self.phases).get(&phase).copied()
    }

    pub fn rule_timings(&self) -> Vec<(String, Benchmark)> {
        lock(&self.rules)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }

    /// Render phase and rule timers as aligned tables; `None` when disabled.
    pub fn report(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let phases: Vec<(String, Benchmark)> = lock(&self.phases)
            .iter()
            .map(|(p, b)| (p.name().to_string(), *b))
            .collect();
        let rules = self.rule_timings();

        let mut out = String::new();
        if self.label.is_empty() {
            out.push_str("Benchmark Report\n\n");
        } else {
            out.push_str(&format!("Benchmark Report for {}\n\n", self.label));
        }
        out.push_str("Timers\n");
        write_table(&mut out, &phases);
        out.push_str("\nRule Timers\n");
        write_table(&mut out, &rules);
        Some(out)
    }
}

fn write_table(out: &mut String, rows: &[(String, Benchmark)]) {
    let (h_name, h_time, h_calls) = ("Name", "Time Spent(ms)", "Num Calls");
    let millis = |b: &Benchmark| b.total.as_millis().to_string();
    let name_w = rows
        .iter()
        .map(|(n, _)| n.len())
        .chain([h_name.len()])
        .max()
        .unwrap_or(0);
    let time_w = rows
        .iter()
        .map(|(_, b)| millis(b).len())
        .chain([h_time.len()])
        .max()
        .unwrap_or(0);
    out.push_str(&format!(
        "{:<name_w$}   {:<time_w$}   {}\n",
        h_name, h_time, h_calls
    ));
    for (name, b) in rows {
        out.push_str(&format!(
            "{:<name_w$}   {:<time_w$}   {}\n",
            name,
            millis(b),
            b.calls
        ));
    }
}

enum Slot<'a> {
    Nop,
    Phase(&'a Benchmarking, Phase),
    Rule(&'a Benchmarking, String),
}

/// Guard recording elapsed time into its benchmark when dropped.
pub struct Timer<'a> {
    slot: Slot<'a>,
    started: Instant,
}

impl Timer<'_> {
    fn nop() -> Self {
        Timer {
            slot: Slot::Nop,
            started: Instant::now(),
        }
    }
}

impl Drop for Timer<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        match &self.slot {
            Slot::Nop => {}
            Slot::Phase(b, phase) => lock(&b.phases).entry(*phase).or_default().record(elapsed),
            Slot::Rule(b, name) => lock(&b.rules)
                .entry(name.clone())
                .or_default()
                .record(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_benchmarking_is_noop() {
        let b = Benchmarking::disabled();
        {
            let _t = b.rule("r1");
            let _p = b.phase(Phase::Scan);
        }
        assert!(b.rule_timings().is_empty());
        assert!(b.phase_timing(Phase::Scan).is_none());
        assert!(b.report().is_none());
    }

    #[test]
    fn test_enabled_benchmarking_counts_calls() {
        let b = Benchmarking::new("scan-1", true);
        for _ in 0..3 {
            let _t = b.rule("r1");
        }
        {
            let _p = b.phase(Phase::WallClock);
        }
        let timings = b.rule_timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].0, "r1");
        assert_eq!(timings[0].1.calls, 3);
        assert_eq!(b.phase_timing(Phase::WallClock).map(|t| t.calls), Some(1));

        let report = b.report().unwrap();
        assert!(report.starts_with("Benchmark Report for scan-1"));
        assert!(report.contains("Wall Clock"));
        assert!(report.contains("Rule Timers"));
        assert!(report.contains("r1"));
    }
}
