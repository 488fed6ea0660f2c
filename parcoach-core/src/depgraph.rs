//! Dependency graph construction: a labeled multigraph over
//! values, memory versions, and call sites, built once the whole
//! module's memory-SSA is available.
//!
//! Every entity this module stores is qualified with the `FuncId` whose
//! arena it lives in, since `Value`/`Inst`/`MemVar` indices are scoped to
//! a single function. A `Node` is therefore the graph's only currency;
//! nothing outside this module indexes by bare `Value`/`MemVar`/`Inst`.

use crate::config::Config;
use crate::error::Recoverable;
use crate::mssa::{Def, FunctionMemorySsa, MemVar, MemorySsa};
use crate::regions::{Region, RegionTable};
use parcoach_ir::{
    Block, CallGraph as CallGraphTrait, Callee, CollectiveTable, ControlFlowGraph, DominanceInfo,
    FuncId, Function, Inst, InstructionData, ModRefOracle, Module, PointsToAnalysis, Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A node in the dependency graph: a top-level value, a memory version,
/// or a call site, each qualified by the function it belongs to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Node {
    /// A top-level SSA value.
    Value(FuncId, Value),
    /// A versioned memory region.
    Mem(FuncId, MemVar),
    /// A call site, distinct from its result value so that
    /// control-dependence and callee edges have somewhere to attach that
    /// isn't conflated with the call's return value.
    Call(FuncId, Inst),
}

fn value_node(func: FuncId, v: Value) -> Node {
    Node::Value(func, v)
}

fn mem_node(func: FuncId, v: MemVar) -> Node {
    Node::Mem(func, v)
}

/// The dependency graph: two parallel adjacency maps (so both forward
/// flood-fill and backward taint-path reconstruction are O(1) per hop),
/// plus the side tables edges alone don't capture (which function a call
/// node resolves to, which memory nodes are taint sources).
#[derive(Clone, Default)]
pub struct DepGraph {
    children: BTreeMap<Node, BTreeSet<Node>>,
    parents: BTreeMap<Node, BTreeSet<Node>>,
    call_callees: BTreeMap<Node, BTreeSet<FuncId>>,
    call_nodes: BTreeSet<Node>,
    taint_sources: BTreeSet<Node>,
    unresolved_calls: usize,
}

impl DepGraph {
    fn add_edge(&mut self, from: Node, to: Node) {
        self.children.entry(from).or_default().insert(to);
        self.parents.entry(to).or_default().insert(from);
    }

    fn mark_callee(&mut self, call: Node, callee: FuncId) {
        self.call_nodes.insert(call);
        self.call_callees.entry(call).or_default().insert(callee);
    }

    fn mark_taint_source(&mut self, node: Node) {
        self.taint_sources.insert(node);
    }

    /// Redirect `node`'s outgoing edges to originate from `replacement`
    /// instead, then drop `node` entirely (merging a phi into one
    /// of its operands). `node`'s incoming edges are dropped, not
    /// redirected: only the eliminated phi's *consumers* should now see
    /// `replacement`, never its own former producers.
    pub(crate) fn merge_into(&mut self, node: Node, replacement: Node) {
        if let Some(children) = self.children.remove(&node) {
            for child in children {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.remove(&node);
                }
                self.add_edge(replacement, child);
            }
        }
        self.remove_node(node);
    }

    /// Drop `node` and every edge touching it.
    pub(crate) fn remove_node(&mut self, node: Node) {
        if let Some(parents) = self.parents.remove(&node) {
            for parent in parents {
                if let Some(children) = self.children.get_mut(&parent) {
                    children.remove(&node);
                }
            }
        }
        if let Some(children) = self.children.remove(&node) {
            for child in children {
                if let Some(parents) = self.parents.get_mut(&child) {
                    parents.remove(&node);
                }
            }
        }
        self.taint_sources.remove(&node);
    }

    /// Whether two nodes have byte-identical incoming and outgoing edge
    /// sets (the phi-elimination equivalence test).
    pub(crate) fn has_same_edges(&self, a: Node, b: Node) -> bool {
        let empty = BTreeSet::new();
        let children_a = self.children.get(&a).unwrap_or(&empty);
        let children_b = self.children.get(&b).unwrap_or(&empty);
        let parents_a = self.parents.get(&a).unwrap_or(&empty);
        let parents_b = self.parents.get(&b).unwrap_or(&empty);
        children_a == children_b && parents_a == parents_b
    }

    /// Outgoing edges of `node`, of any color.
    pub fn children_of(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        self.children.get(&node).into_iter().flatten().copied()
    }

    /// Incoming edges of `node`, of any color.
    pub fn parents_of(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        self.parents.get(&node).into_iter().flatten().copied()
    }

    /// The functions a call node may invoke.
    pub fn callees_of(&self, call: Node) -> impl Iterator<Item = FuncId> + '_ {
        self.call_callees.get(&call).into_iter().flatten().copied()
    }

    /// Every memory node flagged as a taint source during construction
    /// (currently: rank-query outputs).
    pub fn taint_sources(&self) -> impl Iterator<Item = Node> + '_ {
        self.taint_sources.iter().copied()
    }

    /// Whether `node` was flagged as a taint source.
    pub fn is_taint_source(&self, node: Node) -> bool {
        self.taint_sources.contains(&node)
    }

    /// Every call node in the graph, resolved or not.
    pub fn call_nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.call_nodes.iter().copied()
    }

    /// Every call node belonging to `func`.
    pub fn call_nodes_of(&self, func: FuncId) -> impl Iterator<Item = Node> + '_ {
        self.call_nodes
            .iter()
            .copied()
            .filter(move |n| matches!(n, Node::Call(f, _) if *f == func))
    }

    /// Indirect calls that resolved to no callee at all, for
    /// `--statistics`.
    pub fn unresolved_call_count(&self) -> usize {
        self.unresolved_calls
    }

    /// Distinct nodes with at least one incident edge, for `--statistics`.
    pub fn node_count(&self) -> usize {
        let mut nodes: BTreeSet<Node> = self.children.keys().copied().collect();
        nodes.extend(self.parents.keys().copied());
        nodes.len()
    }

    /// Total edge count, for `--statistics`.
    pub fn edge_count(&self) -> usize {
        self.children.values().map(|c| c.len()).sum()
    }
}

/// Maps every function with a body to its (already-computed) CFG and
/// dominance facts; `build` needs both to walk post-dominance frontiers
/// and, via `CallerIndex`, to escalate them across call boundaries.
pub struct FunctionContext<'a> {
    /// The function's control-flow graph.
    pub cfg: &'a ControlFlowGraph,
    /// The function's dominance/post-dominance facts.
    pub dominance: &'a dyn DominanceInfo,
}

/// Maps every call instruction in the module back to the function
/// containing it, inverting the forward `CallGraph::callees` edges the
/// way the divergence checker's inter-procedural post-dominance walk needs: the
/// collaborator traits only expose callees, never callers.
pub(crate) struct CallerIndex {
    callers: HashMap<FuncId, Vec<(FuncId, Inst)>>,
}

impl CallerIndex {
    pub(crate) fn build(module: &Module, call_graph: &dyn CallGraphTrait) -> Self {
        let mut callers: HashMap<FuncId, Vec<(FuncId, Inst)>> = HashMap::new();
        for caller in module.func_ids() {
            let func = module.func(caller);
            for inst in func.dfg.all_insts() {
                if func.dfg.inst(inst).is_call() {
                    for callee in call_graph.callees(inst) {
                        callers.entry(callee).or_default().push((caller, inst));
                    }
                }
            }
        }
        Self { callers }
    }

    pub(crate) fn callers_of(&self, f: FuncId) -> impl Iterator<Item = (FuncId, Inst)> + '_ {
        self.callers.get(&f).into_iter().flatten().copied()
    }
}

fn terminator_predicate(func: &Function, block: Block) -> Option<Value> {
    let inst = func.layout.terminator(block)?;
    match func.dfg.inst(inst) {
        InstructionData::Branch { cond, .. } => Some(*cond),
        _ => None,
    }
}

/// The controlling points of `block` in `func_id`: the `(function,
/// block, predicate)` triples of its own post-dominance frontier, or,
/// when `block` post-dominates the whole function (so nothing inside
/// the function controls it), the controlling points of every call site
/// that invokes this function, recursively. `visited` guards against
/// call-graph cycles.
pub(crate) fn controlling_points(
    func_id: FuncId,
    block: Block,
    module: &Module,
    contexts: &HashMap<FuncId, FunctionContext>,
    callers: &CallerIndex,
    visited: &mut BTreeSet<(FuncId, Block)>,
) -> Vec<(FuncId, Block, Value)> {
    if !visited.insert((func_id, block)) {
        return Vec::new();
    }
    let Some(ctx) = contexts.get(&func_id) else {
        return Vec::new();
    };
    let func = module.func(func_id);
    let frontier = ctx.dominance.post_dominance_frontier(block);
    if !frontier.is_empty() {
        return frontier
            .into_iter()
            .filter_map(|b| terminator_predicate(func, b).map(|p| (func_id, b, p)))
            .collect();
    }
    let mut preds = Vec::new();
    for (caller, call_inst) in callers.callers_of(func_id) {
        let caller_func = module.func(caller);
        if let Some(caller_block) = caller_func.layout.inst_block(call_inst) {
            preds.extend(controlling_points(
                caller,
                caller_block,
                module,
                contexts,
                callers,
                visited,
            ));
        }
    }
    preds
}

/// The controlling predicates of `block` in `func_id`, discarding the
/// block each predicate is the terminator of (this pass only needs
/// the predicate, to wire a single value→call edge).
pub(crate) fn controlling_predicates(
    func_id: FuncId,
    block: Block,
    module: &Module,
    contexts: &HashMap<FuncId, FunctionContext>,
    callers: &CallerIndex,
    visited: &mut BTreeSet<(FuncId, Block)>,
) -> Vec<(FuncId, Value)> {
    controlling_points(func_id, block, module, contexts, callers, visited)
        .into_iter()
        .map(|(f, _, p)| (f, p))
        .collect()
}

/// Build the dependency graph for the whole module, once every
/// function's memory-SSA has already been constructed.
#[allow(clippy::too_many_arguments)]
pub fn build(
    module: &Module,
    contexts: &HashMap<FuncId, FunctionContext>,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    call_graph: &dyn CallGraphTrait,
    modref: &dyn ModRefOracle<Region>,
    memory_ssa: &MemorySsa,
    collectives: &dyn CollectiveTable,
    config: &Config,
) -> DepGraph {
    let mut graph = DepGraph::default();
    let callers = CallerIndex::build(module, call_graph);

    for func_id in module.func_ids() {
        let func = module.func(func_id);
        let Some(func_mssa) = memory_ssa.of(func_id) else {
            continue;
        };
        for inst in func.dfg.all_insts() {
            wire_instruction(
                func_id,
                func,
                inst,
                module,
                regions,
                points_to,
                call_graph,
                modref,
                memory_ssa,
                func_mssa,
                collectives,
                config,
                &mut graph,
            );
        }
        wire_memory_phis(func_id, func_mssa, config, &mut graph);
    }

    for func_id in module.func_ids() {
        let func = module.func(func_id);
        for inst in func.dfg.all_insts() {
            if !func.dfg.inst(inst).is_call() {
                continue;
            }
            let Some(block) = func.layout.inst_block(inst) else {
                continue;
            };
            graph.mark_callee_node_present(func_id, inst);
            let mut visited = BTreeSet::new();
            for (pred_func, pred) in
                controlling_predicates(func_id, block, module, contexts, &callers, &mut visited)
            {
                graph.add_edge(
                    value_node(pred_func, pred),
                    Node::Call(func_id, inst),
                );
            }
        }
    }

    graph
}

impl DepGraph {
    /// Ensure a call node exists in the adjacency maps even when it has
    /// no control-dependence predicates (so iteration over "every call
    /// node" doesn't silently miss unconditional calls).
    fn mark_callee_node_present(&mut self, func: FuncId, inst: Inst) {
        self.children.entry(Node::Call(func, inst)).or_default();
        self.call_nodes.insert(Node::Call(func, inst));
    }
}

/// Memory phis have no dedicated instruction to dispatch on — they live
/// as a `MemVar` whose `Def` is `Phi`, so their edges are wired in one
/// pass over every `MemVar` the function defines rather than inline with
/// `wire_instruction`.
fn wire_memory_phis(
    func_id: FuncId,
    func_mssa: &FunctionMemorySsa,
    config: &Config,
    graph: &mut DepGraph,
) {
    for var in func_mssa.all_vars() {
        if let Def::Phi(info) = func_mssa.def_of(var) {
            for &(_, incoming) in &info.incoming {
                graph.add_edge(mem_node(func_id, incoming), mem_node(func_id, var));
            }
            if !config.no_phi_pred {
                for &p in &info.predicates {
                    graph.add_edge(value_node(func_id, p), mem_node(func_id, var));
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn wire_instruction(
    func_id: FuncId,
    func: &Function,
    inst: Inst,
    module: &Module,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    call_graph: &dyn CallGraphTrait,
    modref: &dyn ModRefOracle<Region>,
    memory_ssa: &MemorySsa,
    func_mssa: &crate::mssa::FunctionMemorySsa,
    collectives: &dyn CollectiveTable,
    config: &Config,
    graph: &mut DepGraph,
) {
    let data = func.dfg.inst(inst);
    match data {
        InstructionData::Call { .. } => {} // handled below, needs its own borrow of `data`
        _ => {
            // Load's pointer operand is gated by `no-ptr-dep` below, so
            // it is excluded from the unconditional operand→result rule
            // that covers every other producing instruction.
            if !matches!(data, InstructionData::Load { .. }) {
                if let Some(result) = func.dfg.inst_result(inst) {
                    for arg in data.value_args() {
                        graph.add_edge(value_node(func_id, arg), value_node(func_id, result));
                    }
                }
            }
            if let InstructionData::Load { ptr } = data {
                if !config.no_ptr_dep {
                    if let Some(result) = func.dfg.inst_result(inst) {
                        graph.add_edge(value_node(func_id, *ptr), value_node(func_id, result));
                    }
                }
                for mu in func_mssa.mu_of(inst) {
                    if let Some(result) = func.dfg.inst_result(inst) {
                        graph.add_edge(mem_node(func_id, mu.var), value_node(func_id, result));
                    }
                }
            }
            if let InstructionData::Store { ptr, value } = data {
                for chi in func_mssa.chi_of(inst) {
                    graph.add_edge(
                        mem_node(func_id, chi.old_var),
                        mem_node(func_id, chi.new_var),
                    );
                    graph.add_edge(value_node(func_id, *value), mem_node(func_id, chi.new_var));
                    if !config.no_ptr_dep {
                        graph.add_edge(value_node(func_id, *ptr), mem_node(func_id, chi.new_var));
                    }
                }
            }
            if let InstructionData::ValuePhi { incoming } = data {
                if let Some(result) = func.dfg.inst_result(inst) {
                    if !config.no_phi_pred {
                        if let Some(block) = func.layout.inst_block(inst) {
                            for (pred_block, _) in incoming {
                                if let Some(p) =
                                    incoming_predicate(func, *pred_block, block)
                                {
                                    graph.add_edge(
                                        value_node(func_id, p),
                                        value_node(func_id, result),
                                    );
                                }
                            }
                        }
                    }
                }
            }
            return;
        }
    }

    wire_call(
        func_id,
        func,
        inst,
        module,
        regions,
        points_to,
        call_graph,
        modref,
        memory_ssa,
        func_mssa,
        collectives,
        config,
        graph,
    );
}

/// The branch condition of `pred_block`'s terminator, if it is the
/// predicate controlling the edge into `succ`. Used for value-phi and
/// memory-phi predicate edges alike.
fn incoming_predicate(func: &Function, pred_block: Block, succ: Block) -> Option<Value> {
    let inst = func.layout.terminator(pred_block)?;
    match func.dfg.inst(inst) {
        InstructionData::Branch { cond, .. } => Some(*cond),
        InstructionData::Jump { target } if *target == succ => None,
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn wire_call(
    func_id: FuncId,
    func: &Function,
    inst: Inst,
    module: &Module,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    call_graph: &dyn CallGraphTrait,
    modref: &dyn ModRefOracle<Region>,
    memory_ssa: &MemorySsa,
    func_mssa: &crate::mssa::FunctionMemorySsa,
    collectives: &dyn CollectiveTable,
    config: &Config,
    graph: &mut DepGraph,
) {
    let InstructionData::Call {
        callee,
        args,
        result,
    } = func.dfg.inst(inst)
    else {
        return;
    };

    let call_node = Node::Call(func_id, inst);
    let callees: BTreeSet<FuncId> = match *callee {
        Callee::Direct(f) => std::iter::once(f).collect(),
        Callee::Indirect(_) => call_graph.callees(inst),
    };
    if callees.is_empty() {
        log::warn!(
            "{}",
            Recoverable::UnresolvedCall { func: func_id, inst }
        );
        graph.unresolved_calls += 1;
        return;
    }

    for chi in func_mssa.chi_of(inst) {
        graph.add_edge(
            mem_node(func_id, chi.old_var),
            mem_node(func_id, chi.new_var),
        );
    }

    for &f in &callees {
        graph.mark_callee(call_node, f);
        let callee_func = module.func(f);

        for (i, &actual) in args.iter().enumerate() {
            if let Some(&formal) = callee_func.params().get(i) {
                graph.add_edge(value_node(func_id, actual), value_node(f, formal));
            }
        }

        if let Some(result) = result {
            for ret_inst in callee_func.dfg.all_insts() {
                if let InstructionData::Return { values } = callee_func.dfg.inst(ret_inst) {
                    if let Some(&rv) = values.first() {
                        graph.add_edge(value_node(f, rv), value_node(func_id, *result));
                    }
                }
            }
        }

        let Some(callee_mssa) = memory_ssa.of(f) else {
            continue;
        };
        for mu in func_mssa.mu_of(inst) {
            if let Some(v_callee) = callee_mssa.entry_chi(mu.region) {
                graph.add_edge(mem_node(func_id, mu.var), mem_node(f, v_callee));
            }
        }
        for chi in func_mssa.chi_of(inst) {
            for ret_mu in callee_mssa.return_mu() {
                if ret_mu.region == chi.region {
                    graph.add_edge(mem_node(f, ret_mu.var), mem_node(func_id, chi.new_var));
                }
            }
        }

        wire_intrinsic(
            func_id, func, inst, args, f, callee_func, regions, points_to, collectives, func_mssa,
            graph,
        );
    }

    let _ = config; // reserved: intrinsic wiring is unconditional, unlike ptr-dep/phi-pred edges
}

/// Name-matched wiring for library calls the analysis understands
/// precisely enough to model better than a generic mod/ref summary:
/// `memcpy`/`memmove`/`memset`, and rank queries that seed taint.
#[allow(clippy::too_many_arguments)]
fn wire_intrinsic(
    func_id: FuncId,
    func: &Function,
    inst: Inst,
    args: &[Value],
    callee_id: FuncId,
    callee_func: &Function,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    collectives: &dyn CollectiveTable,
    func_mssa: &crate::mssa::FunctionMemorySsa,
    graph: &mut DepGraph,
) {
    let _ = func; // kept for symmetry with the other wiring helpers
    match callee_func.name.as_str() {
        "memcpy" | "memmove" if args.len() >= 2 => {
            let dst_regions = regions.regions_of(&points_to.points_to(args[0]));
            let src_regions = regions.regions_of(&points_to.points_to(args[1]));
            let src_vars: Vec<MemVar> = func_mssa
                .mu_of(inst)
                .iter()
                .filter(|mu| src_regions.contains(&mu.region))
                .map(|mu| mu.var)
                .collect();
            let dst_vars: Vec<MemVar> = func_mssa
                .chi_of(inst)
                .iter()
                .filter(|chi| dst_regions.contains(&chi.region))
                .map(|chi| chi.new_var)
                .collect();
            for &src in &src_vars {
                for &dst in &dst_vars {
                    graph.add_edge(mem_node(func_id, src), mem_node(func_id, dst));
                }
            }
        }
        "memset" if args.len() >= 2 => {
            let dst_regions = regions.regions_of(&points_to.points_to(args[0]));
            let dst_vars: Vec<MemVar> = func_mssa
                .chi_of(inst)
                .iter()
                .filter(|chi| dst_regions.contains(&chi.region))
                .map(|chi| chi.new_var)
                .collect();
            for &dst in &dst_vars {
                graph.add_edge(value_node(func_id, args[1]), mem_node(func_id, dst));
            }
        }
        _ => {}
    }

    if let Some(out_arg) = collectives.rank_query_out_arg(callee_id) {
        if let Some(&out) = args.get(out_arg) {
            let out_regions = regions.regions_of(&points_to.points_to(out));
            for chi in func_mssa.chi_of(inst) {
                if out_regions.contains(&chi.region) {
                    graph.mark_taint_source(mem_node(func_id, chi.new_var));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mssa;
    use crate::testutil::{func_id, SimpleDominance, StaticCollaborators};
    use parcoach_entity::EntityRef;
    use parcoach_ir::builder::FunctionBuilder;
    use parcoach_ir::{AllocSite, BinOp, CmpOp};

    /// Build memory-SSA plus a single-function `FunctionContext` map for
    /// `func`, reusing `dominance` for every function that needs one (tests
    /// never need more than one real dominance tree).
    fn single_context<'a>(
        fid: FuncId,
        cfg: &'a ControlFlowGraph,
        dominance: &'a SimpleDominance,
    ) -> HashMap<FuncId, FunctionContext<'a>> {
        [(fid, FunctionContext { cfg, dominance })].into()
    }

    #[test]
    fn operand_to_result_edges_wire_a_straight_line_chain() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let a = b.ins_const(1);
        let c = b.ins_const(2);
        let sum = b.ins_binary(BinOp::Add, a, c);
        b.ins_return(vec![sum]);
        let func = b.finish();

        let mut module = Module::new();
        let fid = module.declare_function(func);
        let func = module.func(fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = SimpleDominance::new(&func, &cfg);
        let contexts = single_context(fid, &cfg, &dominance);

        let collab = StaticCollaborators::new();
        let regions = RegionTable::default();
        let func_mssa = mssa::build_function(
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
        let memory_ssa = MemorySsa::from_functions([(fid, func_mssa)].into());
        let config = Config::default();

        let graph = build(
            &module,
            &contexts,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &memory_ssa,
            &collab.collectives,
            &config,
        );

        assert!(graph
            .children_of(Node::Value(fid, a))
            .any(|n| n == Node::Value(fid, sum)));
        assert!(graph
            .children_of(Node::Value(fid, c))
            .any(|n| n == Node::Value(fid, sum)));
    }

    #[test]
    fn diverging_store_produces_a_predicate_gated_memory_phi() {
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
        let dominance = SimpleDominance::new(&func, &cfg);
        let contexts = single_context(fid, &cfg, &dominance);

        let region = crate::regions::Region::new(0);
        let mut collab = StaticCollaborators::new();
        collab.modref.set_references(fid, [region]);
        collab.modref.set_modifies(fid, [region]);
        collab.points_to.set(ptr, [AllocSite::new(ptr)]);
        let mut regions = RegionTable::default();
        regions.region_for(AllocSite::new(ptr));

        let func_mssa = mssa::build_function(
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
        let memory_ssa = MemorySsa::from_functions([(fid, func_mssa)].into());

        let with_pred = build(
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
        assert!(with_pred
            .parents_of(Node::Mem(fid, phi_var))
            .any(|n| n == Node::Value(fid, cond)));

        let no_pred_config = Config {
            no_phi_pred: true,
            ..Default::default()
        };
        let without_pred = build(
            &module,
            &contexts,
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &memory_ssa,
            &collab.collectives,
            &no_pred_config,
        );
        assert!(!without_pred
            .parents_of(Node::Mem(fid, phi_var))
            .any(|n| n == Node::Value(fid, cond)));
    }

    #[test]
    fn a_call_guarded_by_a_branch_gets_a_control_dependence_edge() {
        let mut b = FunctionBuilder::new("main");
        let entry = b.create_block();
        let then_blk = b.create_block();
        let join = b.create_block();

        b.switch_to_block(entry);
        let zero = b.ins_const(0);
        let cond = b.ins_cmp(CmpOp::Ne, zero, zero);
        b.ins_branch(cond, then_blk, join);

        b.switch_to_block(then_blk);
        b.ins_call_void(func_id(1), vec![]);
        b.ins_jump(join);

        b.switch_to_block(join);
        b.ins_return(vec![]);
        let func = b.finish();

        let mut module = Module::new();
        let fid = module.declare_function(func);
        module.declare_function(Function::new("callee"));
        let func = module.func(fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = SimpleDominance::new(&func, &cfg);
        let contexts = single_context(fid, &cfg, &dominance);

        let collab = StaticCollaborators::new();
        let regions = RegionTable::default();
        let func_mssa = mssa::build_function(
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
        let call_inst = func.layout.block_insts(then_blk)[0];
        let memory_ssa = MemorySsa::from_functions([(fid, func_mssa)].into());

        let graph = build(
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

        assert!(graph
            .parents_of(Node::Call(fid, call_inst))
            .any(|n| n == Node::Value(fid, cond)));
    }

    #[test]
    fn rank_query_chi_becomes_a_taint_source() {
        let mut module = Module::new();
        let rank_fid = module.declare_function(Function::new("MPI_Comm_rank"));

        let mut b = FunctionBuilder::new("main");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let rank_ptr = b.ins_const(0);
        b.ins_call_void(rank_fid, vec![rank_ptr]);
        b.ins_return(vec![]);
        let func = b.finish();
        let main_fid = module.declare_function(func);
        let func = module.func(main_fid).clone();

        let cfg = ControlFlowGraph::compute(&func);
        let dominance = SimpleDominance::new(&func, &cfg);
        let contexts = single_context(main_fid, &cfg, &dominance);

        let mut regions = RegionTable::default();
        let region = regions.region_for(AllocSite::new(rank_ptr));
        let mut collab = StaticCollaborators::new();
        collab.points_to.set(rank_ptr, [AllocSite::new(rank_ptr)]);
        collab.modref.set_modifies(rank_fid, [region]);
        collab.collectives.set_rank_query(rank_fid, 0);

        let main_mssa = mssa::build_function(
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
        let rank_func = module.func(rank_fid).clone();
        let rank_mssa = mssa::build_function(
            rank_fid,
            &rank_func,
            &ControlFlowGraph::compute(&rank_func),
            &regions,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &dominance,
        )
        .unwrap();

        let call_inst = func.layout.block_insts(entry)[1];
        let taint_var = main_mssa.chi_of(call_inst)[0].new_var;
        let memory_ssa =
            MemorySsa::from_functions([(main_fid, main_mssa), (rank_fid, rank_mssa)].into());

        let graph = build(
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

        assert!(graph.is_taint_source(Node::Mem(main_fid, taint_var)));
    }
}
