//! Error taxonomy: invariant violations are fatal, everything else
//! is logged and the analysis keeps going with an over-approximation.

use parcoach_ir::{FuncId, Inst};
use thiserror::Error;

/// A fatal defect in the IR or in the analyzer's own bookkeeping.
/// Surfacing one of these aborts the run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A load, store, or call is missing a Mu/Chi annotation it is
    /// required to have.
    #[error("invariant violated in {func}: {detail}")]
    Invariant {
        /// The function being analyzed when the invariant broke.
        func: String,
        /// Human-readable description of what was expected.
        detail: String,
    },

    /// A memory-SSA version number was reused within a function.
    #[error("memory-SSA version clash in {func}, region r{region}: version {version} assigned twice")]
    VersionClash {
        /// The function being analyzed.
        func: String,
        /// The region whose version counter was violated.
        region: u32,
        /// The version number that was assigned more than once.
        version: u32,
    },

    /// A phi operand referenced a memory variable that does not exist.
    #[error("dangling phi operand in {func}: block {block}")]
    DanglingPhiOperand {
        /// The function being analyzed.
        func: String,
        /// The block whose phi has the dangling operand.
        block: String,
    },
}

/// A conflict between two configuration options.
/// Returned before the analysis starts; it never aborts mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `context-sensitive` and `dot-taint-paths` were both requested;
    /// the taint paths a context-sensitive pass would report don't
    /// correspond to a single intra-procedural path to visualize.
    #[error("--context-sensitive is incompatible with --dot-taint-paths")]
    ContextSensitiveWithTaintPaths,

    /// No collective table was enabled (none of `--check-mpi`,
    /// `--check-omp`, `--check-upc`, `--check-cuda`).
    #[error("no collective table enabled: pass at least one of --check-mpi, --check-omp, --check-upc, --check-cuda")]
    NoCollectiveTableEnabled,
}

/// A non-fatal defect observed during the run: logged via the `log`
/// facade and recorded so `statistics`/`--timer` output can report how
/// many were swallowed, but never propagated.
#[derive(Debug, Clone)]
pub enum Recoverable {
    /// An indirect call resolved to an empty callee set. The call
    /// contributes no `call -> function` edge and no summary
    /// contribution; downstream results over-approximate.
    UnresolvedCall {
        /// The function containing the call.
        func: FuncId,
        /// The call instruction itself.
        inst: Inst,
    },

    /// An instruction kind this analyzer has no dispatch rule for.
    /// Treated as producing no edges; downstream results
    /// over-approximate.
    UnhandledInstruction {
        /// The function containing the instruction.
        func: FuncId,
        /// The unhandled instruction.
        inst: Inst,
    },
}

impl std::fmt::Display for Recoverable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Recoverable::UnresolvedCall { func, inst } => {
                write!(f, "unresolved indirect call {inst} in {func}: treating as no-op")
            }
            Recoverable::UnhandledInstruction { func, inst } => {
                write!(f, "unhandled instruction {inst} in {func}: producing no edges")
            }
        }
    }
}
