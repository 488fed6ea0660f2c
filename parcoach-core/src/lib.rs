//! Memory-SSA construction, dependency-graph taint analysis, and
//! collective-divergence checking for MPI/OpenMP/UPC/CUDA programs.
//!
//! This crate owns everything downstream of the IR defined in
//! `parcoach-ir`: memory regions, memory-SSA, the
//! dependency graph and its taint propagation,
//! collective summaries, and the divergence checker itself
//! itself. `parcoach-cli` is the only consumer of this crate's public
//! surface.

pub mod checker;
pub mod collective;
pub mod config;
pub mod depgraph;
pub mod driver;
pub mod error;
pub mod mssa;
pub mod phi_elim;
pub mod regions;
pub mod taint;
pub mod timing;

#[cfg(test)]
mod testutil;

pub use checker::Warning;
pub use collective::{CollectiveSummaries, Seq, Summary};
pub use config::Config;
pub use depgraph::{DepGraph, FunctionContext, Node};
pub use driver::{AnalysisReport, Collaborators, Driver};
pub use error::{AnalysisError, ConfigError, Recoverable};
pub use mssa::{FunctionMemorySsa, MemVar, MemorySsa};
pub use regions::{Region, RegionTable};
pub use taint::TaintResult;
pub use timing::{Stats, TimingReport};
