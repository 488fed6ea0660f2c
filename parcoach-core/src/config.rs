//! Analysis configuration: one explicit, validated struct instead
//! of global mutable option flags.

use crate::error::ConfigError;

/// Which collective catalogs to enable. At least one must be set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectiveTables {
    /// `--check-mpi`.
    pub mpi: bool,
    /// `--check-omp`.
    pub omp: bool,
    /// `--check-upc`.
    pub upc: bool,
    /// `--check-cuda`.
    pub cuda: bool,
}

impl CollectiveTables {
    fn any(&self) -> bool {
        self.mpi || self.omp || self.upc || self.cuda
    }
}

/// Pointer-analysis precision knob (`--strong-update` / `--weak-update`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// A store through a singleton points-to set replaces the prior
    /// version instead of merging with it.
    Strong,
    /// Every store merges with the prior version (safe default).
    #[default]
    Weak,
}

/// Dump options, grouped because they all answer "print me this
/// intermediate state and continue" rather than changing what's computed.
#[derive(Clone, Debug, Default)]
pub struct DumpOptions {
    /// `--dump-ssa`: print memory-SSA for every function.
    pub dump_ssa: bool,
    /// `--dump-ssa-func=<name>`: print memory-SSA for one function only.
    pub dump_ssa_func: Option<String>,
    /// `--dump-regions`.
    pub dump_regions: bool,
    /// `--with-reg-name`: compute human-readable region names for
    /// `--dump-regions` output (walks debug info back to the
    /// declaration; otherwise regions print as `r<n>`).
    pub with_reg_name: bool,
    /// `--dump-modref`.
    pub dump_modref: bool,
    /// `--statistics`: print IR counts and exit before running A-H.
    pub statistics: bool,
}

/// Output artifact options.
#[derive(Clone, Debug, Default)]
pub struct OutputOptions {
    /// `--dot-depgraph`: write the full DG as `dg.dot`.
    pub dot_depgraph: bool,
    /// `--dot-taint-paths`: write `taintedpath-<file>-<line>.dot` per
    /// warning.
    pub dot_taint_paths: bool,
    /// `--no-instrumentation`: analyze only, skip the instrumentation
    /// placement plan.
    pub no_instrumentation: bool,
    /// Text or JSON rendering of the final report.
    pub format: ReportFormat,
}

/// `--format=text|json`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable table to stderr/stdout.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

/// Every tunable the analyzer accepts, validated once at construction.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// `--disable-phi-elim`: skip phi-elimination.
    pub disable_phi_elim: bool,
    /// `--context-sensitive`. Accepted and
    /// threaded through, but the taint pass still runs
    /// context-insensitively.
    pub context_sensitive: bool,
    /// `--no-ptr-dep`: omit the `v→r` edge contributed by a load/store's
    /// pointer operand.
    pub no_ptr_dep: bool,
    /// `--no-phi-pred`: omit predicate→φ control edges.
    pub no_phi_pred: bool,
    /// `--no-dataflow`: skip taint propagation entirely; every NAVS
    /// predicate is treated as if it were tainted.
    pub no_dataflow: bool,
    /// `--timer`: collect and print per-phase wall-clock timings.
    pub timer: bool,
    /// Pointer-analysis precision knob.
    pub update_mode: UpdateMode,
    /// Which collective catalogs are active.
    pub collectives: CollectiveTables,
    /// Dump/diagnostic flags.
    pub dump: DumpOptions,
    /// Output artifact flags.
    pub output: OutputOptions,
}

impl Config {
    /// Validate option combinations that are individually well-formed but
    /// jointly meaningless. Called once before the
    /// driver starts; never during the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context_sensitive && self.output.dot_taint_paths {
            return Err(ConfigError::ContextSensitiveWithTaintPaths);
        }
        if !self.collectives.any() {
            return Err(ConfigError::NoCollectiveTableEnabled);
        }
        Ok(())
    }
}
