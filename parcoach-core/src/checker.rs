//! Divergence checking: for every collective call site, walk its
//! inter-procedural post-dominance frontier and flag any controlling
//! block whose collective summary disagrees with itself (`NAVS`) under
//! a predicate that rank-dependent data actually reaches.

use crate::collective::{collective_call, resolved_callees, CollectiveSummaries, Seq};
use crate::depgraph::{controlling_points, CallerIndex, FunctionContext, Node};
use crate::taint::TaintResult;
use parcoach_ir::{CallGraph as CallGraphTrait, CollectiveTable, FuncId, Module};
use std::collections::{BTreeSet, HashMap};

/// A reported potential deadlock: a collective call site whose execution
/// is controlled by a tainted predicate along a path where the
/// collective sequence disagrees with another path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    /// Source file of the collective call, if debug info was attached.
    pub file: Option<std::rc::Rc<str>>,
    /// Source line of the collective call, if debug info was attached.
    pub line: Option<u32>,
    /// The collective function's name (`MPI_Barrier`, `omp_barrier`, ...).
    pub collective_name: String,
    /// `file:line` of every controlling block responsible for the
    /// warning, one entry per qualifying block.
    pub controlling_locations: Vec<String>,
    /// A human-readable summary of why the call may deadlock.
    pub message: String,
}

/// Check every collective call site in `module` for potential collective
/// divergence. `taint` is `None` when `--no-dataflow` was requested:
/// every controlling predicate is then treated as tainted, skipping
/// taint propagation entirely.
pub fn check(
    module: &Module,
    contexts: &HashMap<FuncId, FunctionContext>,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
    summaries: &CollectiveSummaries,
    taint: Option<&TaintResult>,
) -> Vec<Warning> {
    let callers = CallerIndex::build(module, call_graph);
    let mut warnings = Vec::new();

    for func_id in module.func_ids() {
        let func = module.func(func_id);
        if func.is_declaration() {
            continue;
        }
        for inst in func.dfg.all_insts() {
            if !func.dfg.inst(inst).is_call() {
                continue;
            }
            let Some((_, comm)) = collective_call(func, inst, call_graph, collectives) else {
                continue;
            };
            let Some(block) = func.layout.inst_block(inst) else {
                continue;
            };
            let collective_name = resolved_callees(func, inst, call_graph)
                .iter()
                .find(|f| collectives.is_collective(**f))
                .map(|f| module.func(*f).name.clone())
                .unwrap_or_else(|| "<unknown>".to_string());

            let mut visited = BTreeSet::new();
            let points =
                controlling_points(func_id, block, module, contexts, &callers, &mut visited);

            let mut locations = Vec::new();
            for (pred_func, pred_block, predicate) in points {
                let navs = match comm {
                    Some(c) => matches!(
                        summaries.block_per_comm(pred_func, pred_block).and_then(|m| m.get(&c)),
                        Some(Seq::Navs)
                    ),
                    None => matches!(
                        summaries.block_seq(pred_func, pred_block),
                        Some(Seq::Navs)
                    ),
                };
                if !navs {
                    continue;
                }

                let tainted = match taint {
                    None => true,
                    Some(result) => result.is_tainted(Node::Value(pred_func, predicate)),
                };
                if !tainted {
                    continue;
                }

                let pred_func_ref = module.func(pred_func);
                let loc = pred_func_ref
                    .layout
                    .terminator(pred_block)
                    .and_then(|t| pred_func_ref.debug_locs[t].clone());
                locations.push(match loc {
                    Some(l) => format!("{}", l),
                    None => format!("{}@{:?}", pred_func_ref.name, pred_block),
                });
            }

            if locations.is_empty() {
                continue;
            }

            let loc = func.debug_locs[inst].clone();
            warnings.push(Warning {
                file: loc.as_ref().map(|l| l.file.clone()),
                line: loc.as_ref().map(|l| l.line),
                collective_name: collective_name.clone(),
                controlling_locations: locations,
                message: format!(
                    "call to {collective_name} may not be reached by every rank: \
                     its execution is controlled by a rank-dependent condition whose \
                     branches disagree on the following collective sequence"
                ),
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective;
    use crate::config::Config;
    use crate::depgraph::{self, DepGraph};
    use crate::mssa::{self, MemorySsa};
    use crate::regions::RegionTable;
    use crate::taint;
    use crate::testutil::{SimpleDominance, StaticCollaborators};
    use parcoach_ir::builder::FunctionBuilder;
    use parcoach_ir::{CmpOp, ControlFlowGraph, Function};

    fn single_context<'a>(
        fid: FuncId,
        cfg: &'a ControlFlowGraph,
        dominance: &'a SimpleDominance,
    ) -> HashMap<FuncId, FunctionContext<'a>> {
        [(fid, FunctionContext { cfg, dominance })].into()
    }

    fn build_main(barrier_on_both_branches: bool) -> (Module, FuncId, DepGraph, StaticCollaborators, ControlFlowGraph, SimpleDominance) {
        let mut module = Module::new();
        let barrier_fid = module.declare_function(Function::new("MPI_Barrier"));

        let mut b = FunctionBuilder::new("main");
        let entry = b.create_block();
        let then_blk = b.create_block();
        let else_blk = b.create_block();
        let join = b.create_block();

        b.switch_to_block(entry);
        let zero = b.ins_const(0);
        let cond = b.ins_cmp(CmpOp::Ne, zero, zero);
        b.ins_branch(cond, then_blk, else_blk);

        b.switch_to_block(then_blk);
        b.ins_call_void(barrier_fid, vec![]);
        b.ins_jump(join);

        b.switch_to_block(else_blk);
        if barrier_on_both_branches {
            b.ins_call_void(barrier_fid, vec![]);
        }
        b.ins_jump(join);

        b.switch_to_block(join);
        b.ins_return(vec![]);
        let func = b.finish();
        let main_fid = module.declare_function(func);
        let func = module.func(main_fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = SimpleDominance::new(&func, &cfg);
        let contexts = single_context(main_fid, &cfg, &dominance);

        let mut collab = StaticCollaborators::new();
        collab
            .collectives
            .set_collective(barrier_fid, parcoach_ir::CollectiveColor::Mpi);
        let regions = RegionTable::default();
        let func_mssa = mssa::build_function(
            main_fid,
            &func,
            &cfg,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &dominance,
        )
        .unwrap();
        let memory_ssa = MemorySsa::from_functions([(main_fid, func_mssa)].into());

        let graph = depgraph::build(
            &module,
            &contexts,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &memory_ssa,
            &collab.collectives,
            &Config::default(),
        );

        (module, main_fid, graph, collab, cfg, dominance)
    }

    #[test]
    fn a_divergent_collective_with_no_dataflow_is_reported() {
        let (module, main_fid, graph, collab, cfg, dominance) = build_main(false);
        let contexts = single_context(main_fid, &cfg, &dominance);
        let summaries =
            collective::build(&module, &contexts, &graph, &collab.call_graph, &collab.collectives);

        let warnings = check(
            &module,
            &contexts,
            &collab.call_graph,
            &collab.collectives,
            &summaries,
            None,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].collective_name, "MPI_Barrier");
    }

    #[test]
    fn an_agreeing_collective_is_never_reported() {
        let (module, main_fid, graph, collab, cfg, dominance) = build_main(true);
        let contexts = single_context(main_fid, &cfg, &dominance);
        let summaries =
            collective::build(&module, &contexts, &graph, &collab.call_graph, &collab.collectives);

        let warnings = check(
            &module,
            &contexts,
            &collab.call_graph,
            &collab.collectives,
            &summaries,
            None,
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn a_divergent_collective_with_an_untainted_predicate_is_not_reported() {
        let (module, main_fid, graph, collab, cfg, dominance) = build_main(false);
        let contexts = single_context(main_fid, &cfg, &dominance);
        let summaries =
            collective::build(&module, &contexts, &graph, &collab.call_graph, &collab.collectives);
        let taint_result = taint::propagate(&graph);

        let warnings = check(
            &module,
            &contexts,
            &collab.call_graph,
            &collab.collectives,
            &summaries,
            Some(&taint_result),
        );
        assert!(warnings.is_empty());
    }
}
