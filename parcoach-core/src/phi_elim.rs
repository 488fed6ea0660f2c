//! Memory-phi elimination: collapses the spurious dependency a
//! 2-input memory phi introduces when both its operands already agree on
//! every dependency (the `if (p) a = 0; else a = 0;` idiom), so the
//! taint pass downstream doesn't treat `p` as controlling `a`.
//!
//! Runs on the dependency graph, not on `InstructionData`: by this point
//! a memory phi is pure bookkeeping on a `MemVar`'s `Def`, with no
//! instruction of its own, so "is this phi eliminable" is a question
//! about graph structure (edge-set equality of its two operands), not
//! about IR shape.

use crate::depgraph::{DepGraph, Node};
use crate::mssa::{Def, FunctionMemorySsa, MemVar};
use parcoach_ir::FuncId;
use std::collections::HashSet;

/// Eliminate every eligible 2-input memory phi in `func_mssa`, iterating
/// to a fixed point. Disabled by `disable-phi-elim` (the driver simply
/// skips calling this).
pub fn eliminate(func_id: FuncId, func_mssa: &mut FunctionMemorySsa, graph: &mut DepGraph) {
    let mut eliminated: HashSet<MemVar> = HashSet::new();

    loop {
        let candidate = func_mssa.all_vars().find_map(|p| {
            if eliminated.contains(&p) {
                return None;
            }
            let Def::Phi(info) = func_mssa.def_of(p) else {
                return None;
            };
            if info.incoming.len() != 2 {
                return None;
            }
            let v0 = info.incoming[0].1;
            let v1 = info.incoming[1].1;
            if eliminated.contains(&v0) || eliminated.contains(&v1) {
                return None;
            }
            if matches!(func_mssa.def_of(v0), Def::Phi(_))
                || matches!(func_mssa.def_of(v1), Def::Phi(_))
            {
                return None;
            }
            let same = graph.has_same_edges(Node::Mem(func_id, v0), Node::Mem(func_id, v1));
            same.then_some((p, v0, v1))
        });

        let Some((p, v0, v1)) = candidate else {
            break;
        };

        // If `p` itself feeds another phi, that phi's operand slot must
        // now name `v0` instead.
        let others: Vec<MemVar> = func_mssa.all_vars().collect();
        for other in others {
            func_mssa.rewrite_phi_operand(other, p, v0);
        }

        graph.merge_into(Node::Mem(func_id, p), Node::Mem(func_id, v0));
        graph.remove_node(Node::Mem(func_id, v1));
        eliminated.insert(p);
        eliminated.insert(v1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::depgraph::{self, FunctionContext};
    use crate::mssa::MemorySsa;
    use crate::regions::{Region, RegionTable};
    use crate::testutil::StaticCollaborators;
    use parcoach_entity::EntityRef;
    use parcoach_ir::builder::FunctionBuilder;
    use parcoach_ir::{AllocSite, CmpOp, ControlFlowGraph, Module};
    use std::collections::HashMap;

    /// Two branches that store the identical constant through the
    /// identical pointer: the memory phi they produce has nothing left to
    /// distinguish its operands, so it is eliminable.
    #[test]
    fn identical_branch_stores_collapse_their_memory_phi() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        let then_blk = b.create_block();
        let else_blk = b.create_block();
        let join = b.create_block();

        b.switch_to_block(entry);
        let ptr = b.ins_const(0);
        let zero = b.ins_const(0);
        let cond = b.ins_cmp(CmpOp::Ne, zero, zero);
        b.ins_branch(cond, then_blk, else_blk);

        b.switch_to_block(then_blk);
        b.ins_store(ptr, zero);
        b.ins_jump(join);

        b.switch_to_block(else_blk);
        b.ins_store(ptr, zero);
        b.ins_jump(join);

        b.switch_to_block(join);
        let loaded = b.ins_load(ptr);
        b.ins_return(vec![loaded]);
        let func = b.finish();

        let mut module = Module::new();
        let fid = module.declare_function(func);
        let func = module.func(fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = crate::testutil::SimpleDominance::new(&func, &cfg);
        let contexts: HashMap<_, _> = [(
            fid,
            FunctionContext {
                cfg: &cfg,
                dominance: &dominance,
            },
        )]
        .into();

        let region = Region::new(0);
        let mut collab = StaticCollaborators::new();
        collab.modref.set_references(fid, [region]);
        collab.modref.set_modifies(fid, [region]);
        collab.points_to.set(ptr, [AllocSite::new(ptr)]);
        let mut regions = RegionTable::default();
        regions.region_for(AllocSite::new(ptr));

        let mut func_mssa = crate::mssa::build_function(
            fid,
            &func,
            &cfg,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &dominance,
        )
        .unwrap();

        let join_load = func.layout.block_insts(join)[0];
        let phi_var = func_mssa.mu_of(join_load)[0].var;
        let (v0, v1) = match func_mssa.def_of(phi_var) {
            Def::Phi(info) => (info.incoming[0].1, info.incoming[1].1),
            _ => panic!("expected a memory phi"),
        };

        let memory_ssa = MemorySsa::from_functions([(fid, func_mssa.clone())].into());
        let mut graph = depgraph::build(
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
        assert!(graph.has_same_edges(Node::Mem(fid, v0), Node::Mem(fid, v1)));

        eliminate(fid, &mut func_mssa, &mut graph);

        assert!(graph.children_of(Node::Mem(fid, phi_var)).next().is_none());
        assert!(graph.parents_of(Node::Mem(fid, phi_var)).next().is_none());
        assert!(graph.children_of(Node::Mem(fid, v1)).next().is_none());
        assert!(graph
            .children_of(Node::Mem(fid, v0))
            .any(|n| n == Node::Value(fid, loaded)));
    }

    #[test]
    fn a_phi_with_a_non_phi_mismatched_operand_is_left_alone() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        let then_blk = b.create_block();
        let else_blk = b.create_block();
        let join = b.create_block();

        b.switch_to_block(entry);
        let ptr = b.ins_const(0);
        let zero = b.ins_const(0);
        let one = b.ins_const(1);
        let cond = b.ins_cmp(CmpOp::Ne, zero, zero);
        b.ins_branch(cond, then_blk, else_blk);

        b.switch_to_block(then_blk);
        b.ins_store(ptr, zero);
        b.ins_jump(join);

        b.switch_to_block(else_blk);
        b.ins_store(ptr, one);
        b.ins_jump(join);

        b.switch_to_block(join);
        let loaded = b.ins_load(ptr);
        b.ins_return(vec![loaded]);
        let func = b.finish();

        let mut module = Module::new();
        let fid = module.declare_function(func);
        let func = module.func(fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = crate::testutil::SimpleDominance::new(&func, &cfg);
        let contexts: HashMap<_, _> = [(
            fid,
            FunctionContext {
                cfg: &cfg,
                dominance: &dominance,
            },
        )]
        .into();

        let region = Region::new(0);
        let mut collab = StaticCollaborators::new();
        collab.modref.set_references(fid, [region]);
        collab.modref.set_modifies(fid, [region]);
        collab.points_to.set(ptr, [AllocSite::new(ptr)]);
        let mut regions = RegionTable::default();
        regions.region_for(AllocSite::new(ptr));

        let mut func_mssa = crate::mssa::build_function(
            fid,
            &func,
            &cfg,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &dominance,
        )
        .unwrap();

        let join_load = func.layout.block_insts(join)[0];
        let phi_var = func_mssa.mu_of(join_load)[0].var;

        let memory_ssa = MemorySsa::from_functions([(fid, func_mssa.clone())].into());
        let mut graph = depgraph::build(
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

        eliminate(fid, &mut func_mssa, &mut graph);

        assert!(matches!(func_mssa.def_of(phi_var), Def::Phi(_)));
        assert!(graph.children_of(Node::Mem(fid, phi_var)).next().is_some());
    }
}
