//! The driver: wires regions → memory-SSA → dependency graph →
//! phi-elimination → taint propagation → collective summaries →
//! divergence checking, and collects the result into one report.
//!
//! Every collaborator (points-to, call graph, mod/ref, dominance,
//! collective table) is supplied by the caller; this crate decides *when*
//! to call them, never how to compute them.

use crate::checker::{self, Warning};
use crate::collective::{self, CollectiveSummaries};
use crate::config::Config;
use crate::depgraph::{self, FunctionContext};
use crate::error::AnalysisError;
use crate::mssa::{self, MemorySsa};
use crate::phi_elim;
use crate::regions::RegionTable;
use crate::taint::{self, TaintResult};
use crate::timing::{Stats, TimingCollector, TimingReport};
use parcoach_ir::{
    CallGraph as CallGraphTrait, CollectiveTable, ControlFlowGraph, DominanceInfo, FuncId, Module,
    PointsToAnalysis,
};
use std::collections::HashMap;

/// The product of a full analysis run: every warning the checker
/// emitted, plus summary counters for `--statistics`.
#[derive(Clone, Debug, Default)]
pub struct AnalysisReport {
    /// Potential collective-divergence warnings, in the order the
    /// checker visited call sites (module function order, then
    /// instruction order within each function).
    pub warnings: Vec<Warning>,
    /// IR and analysis-result counters.
    pub stats: Stats,
}

/// Every collaborator the driver needs but does not compute itself.
pub struct Collaborators<'a> {
    /// Points-to facts for the whole module.
    pub points_to: &'a dyn PointsToAnalysis,
    /// Call graph with indirect-call resolution.
    pub call_graph: &'a dyn CallGraphTrait,
    /// Transitive mod/ref summaries.
    pub modref: &'a dyn parcoach_ir::ModRefOracle<crate::regions::Region>,
    /// The active collective catalog (MPI/OpenMP/UPC/CUDA).
    pub collectives: &'a dyn CollectiveTable,
    /// Dominance/post-dominance/loop facts, one per function with a body.
    /// Declarations need no entry.
    pub dominance: &'a HashMap<FuncId, Box<dyn DominanceInfo>>,
}

/// Runs the analysis end to end over one module.
pub struct Driver<'a> {
    module: &'a Module,
    config: &'a Config,
    collaborators: Collaborators<'a>,
}

impl<'a> Driver<'a> {
    /// Construct a driver, rejecting conflicting configuration up front
    /// before any pass runs.
    pub fn new(
        module: &'a Module,
        config: &'a Config,
        collaborators: Collaborators<'a>,
    ) -> Result<Self, crate::error::ConfigError> {
        config.validate()?;
        Ok(Self {
            module,
            config,
            collaborators,
        })
    }

    /// Run the full A→H pipeline, returning the report and, when
    /// `config.timer` is set, the per-phase timings.
    pub fn run(&self) -> Result<(AnalysisReport, Option<TimingReport>), AnalysisError> {
        let mut timer = self.config.timer.then(TimingCollector::new);

        let cfgs: HashMap<FuncId, ControlFlowGraph> = self
            .module
            .func_ids()
            .map(|f| (f, ControlFlowGraph::compute(self.module.func(f))))
            .collect();

        let region_table = run_timed(&mut timer, "regions", || {
            RegionTable::build(self.collaborators.points_to.all_allocation_sites())
        });

        let mut per_func_mssa = HashMap::new();
        run_timed(&mut timer, "memory_ssa", || -> Result<(), AnalysisError> {
            for func_id in self.module.func_ids() {
                let func = self.module.func(func_id);
                let Some(dominance) = self.collaborators.dominance.get(&func_id) else {
                    continue;
                };
                let cfg = &cfgs[&func_id];
                let func_mssa = mssa::build_function(
                    func_id,
                    func,
                    cfg,
                    &region_table,
                    self.collaborators.points_to,
                    self.collaborators.call_graph,
                    self.collaborators.modref,
                    dominance.as_ref(),
                )?;
                per_func_mssa.insert(func_id, func_mssa);
            }
            Ok(())
        })?;

        let mem_vars: usize = per_func_mssa.values().map(|m| m.all_vars().count()).sum();
        let mut mu_count = 0;
        let mut chi_count = 0;
        for (&func_id, func_mssa) in &per_func_mssa {
            let func = self.module.func(func_id);
            for inst in func.dfg.all_insts() {
                mu_count += func_mssa.mu_of(inst).len();
                chi_count += func_mssa.chi_of(inst).len();
            }
        }

        let mut memory_ssa = MemorySsa::from_functions(per_func_mssa);

        let contexts: HashMap<FuncId, FunctionContext> = self
            .module
            .func_ids()
            .filter_map(|f| {
                self.collaborators.dominance.get(&f).map(|d| {
                    (
                        f,
                        FunctionContext {
                            cfg: &cfgs[&f],
                            dominance: d.as_ref(),
                        },
                    )
                })
            })
            .collect();

        let mut graph = run_timed(&mut timer, "depgraph", || {
            depgraph::build(
                self.module,
                &contexts,
                &region_table,
                self.collaborators.points_to,
                self.collaborators.call_graph,
                self.collaborators.modref,
                &memory_ssa,
                self.collaborators.collectives,
                self.config,
            )
        });

        if !self.config.disable_phi_elim {
            run_timed(&mut timer, "phi_elim", || {
                for func_id in self.module.func_ids() {
                    if let Some(func_mssa) = memory_ssa.of_mut(func_id) {
                        phi_elim::eliminate(func_id, func_mssa, &mut graph);
                    }
                }
            });
        }

        let taint_result: Option<TaintResult> = if self.config.no_dataflow {
            None
        } else {
            Some(run_timed(&mut timer, "taint", || taint::propagate(&graph)))
        };

        let summaries: CollectiveSummaries = run_timed(&mut timer, "collective", || {
            collective::build(
                self.module,
                &contexts,
                &graph,
                self.collaborators.call_graph,
                self.collaborators.collectives,
            )
        });

        let warnings = run_timed(&mut timer, "checker", || {
            checker::check(
                self.module,
                &contexts,
                self.collaborators.call_graph,
                self.collaborators.collectives,
                &summaries,
                taint_result.as_ref(),
            )
        });

        let stats = Stats {
            functions: self.module.func_ids().filter(|f| !self.module.func(*f).is_declaration()).count(),
            regions: region_table.len(),
            mu_count,
            chi_count,
            mem_vars,
            dg_nodes: graph.node_count(),
            dg_edges: graph.edge_count(),
            warnings: warnings.len(),
            recoverable_errors: graph.unresolved_call_count(),
        };

        let report = AnalysisReport { warnings, stats };
        Ok((report, timer.map(TimingCollector::finish)))
    }
}

fn run_timed<T>(timer: &mut Option<TimingCollector>, phase: &'static str, f: impl FnOnce() -> T) -> T {
    match timer {
        Some(t) => t.time(phase, f),
        None => f(),
    }
}
