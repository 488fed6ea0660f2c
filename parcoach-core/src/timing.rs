//! Per-phase wall-clock timing (`--timer`) and IR/result counters
//! (`--statistics`) — ambient bookkeeping, reified as typed
//! structs rather than the loose global counters upstream kept.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Accumulates wall-clock time per named phase as the driver runs.
/// Dropped without ever being turned into a `TimingReport` when
/// `--timer` wasn't requested.
#[derive(Default)]
pub struct TimingCollector {
    phases: BTreeMap<&'static str, Duration>,
}

impl TimingCollector {
    /// A fresh collector with no recorded phases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, recording its wall-clock duration under `phase`.
    pub fn time<T>(&mut self, phase: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.phases.insert(phase, start.elapsed());
        result
    }

    /// Freeze the collected phases into a report.
    pub fn finish(self) -> TimingReport {
        TimingReport {
            phases: self.phases,
        }
    }
}

/// Per-phase wall-clock timings, printed by `--timer`. Phase names match
/// the driver's own stage names (`regions`, `memory_ssa`, `depgraph`,
/// `phi_elim`, `taint`, `collective`, `checker`).
#[derive(Clone, Debug, Default)]
pub struct TimingReport {
    phases: BTreeMap<&'static str, Duration>,
}

impl TimingReport {
    /// The recorded duration of `phase`, if it ran.
    pub fn phase(&self, name: &str) -> Option<Duration> {
        self.phases.get(name).copied()
    }

    /// Every recorded phase, in the order the driver executed them.
    pub fn phases(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.phases.iter().map(|(&name, &d)| (name, d))
    }
}

/// IR and result counters printed by `--statistics`: how big was the
/// input, and how much did the analysis find.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Functions with a body analyzed.
    pub functions: usize,
    /// Distinct memory regions.
    pub regions: usize,
    /// Total Mu annotations across every function.
    pub mu_count: usize,
    /// Total Chi annotations across every function.
    pub chi_count: usize,
    /// Total memory-SSA variables (including phis) across every function.
    pub mem_vars: usize,
    /// Dependency-graph node count.
    pub dg_nodes: usize,
    /// Dependency-graph edge count.
    pub dg_edges: usize,
    /// Warnings emitted by the divergence checker.
    pub warnings: usize,
    /// Recoverable conditions logged and swallowed during the run
    /// (unresolved indirect calls and unhandled instruction kinds).
    pub recoverable_errors: usize,
}
