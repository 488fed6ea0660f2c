//! Collective summary computation: a per-function reverse-BFS
//! from every exit, giving each block the sequence of collective calls
//! that will execute after it, or `NAVS` ("not a valid sequence") when
//! that sequence depends on which path is taken.
//!
//! Function summaries are consumed in reverse topological order of the
//! call graph so that a callee's summary is always ready before its
//! callers need it (`build` computes that order itself via Tarjan, since
//! the `CallGraph` collaborator only exposes forward edges).

use crate::depgraph::{DepGraph, FunctionContext};
use parcoach_ir::{
    Block, Callee, CallGraph as CallGraphTrait, CollectiveColor, CollectiveTable,
    ControlFlowGraph, DominanceInfo, FuncId, Function, Inst, InstructionData, Module, Value,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// A collective-call sequence, or the sentinel meaning "different paths
/// disagree on what executes here."
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Seq {
    /// An agreed-upon ordered sequence of collective colors.
    Known(Vec<CollectiveColor>),
    /// `NAVS`: at least two finalized paths out of this point disagree.
    Navs,
}

impl Seq {
    fn empty() -> Self {
        Seq::Known(Vec::new())
    }

    fn prepend_color(self, color: CollectiveColor) -> Self {
        match self {
            Seq::Navs => Seq::Navs,
            Seq::Known(mut v) => {
                v.insert(0, color);
                Seq::Known(v)
            }
        }
    }

    fn prepend_seq(self, prefix: Seq) -> Self {
        match (prefix, self) {
            (Seq::Navs, _) | (_, Seq::Navs) => Seq::Navs,
            (Seq::Known(p), Seq::Known(t)) => {
                let mut v = p;
                v.extend(t);
                Seq::Known(v)
            }
        }
    }
}

/// A function's collective summary: its entry-block sequence, folded to
/// a single comm-agnostic sequence, plus a per-communicator breakdown
/// for MPI-mode collectives whose communicator argument is a `Value`
/// local to this function.
///
/// Cross-function communicator identity is not tracked: when a caller
/// folds a callee's summary into its own block, it uses `combined`
/// rather than trying to match the callee's communicator `Value`s
/// against its own (that would need argument-aware renaming, which is
/// the same context-sensitivity this crate leaves as an open question —
/// see `DESIGN.md`). `per_comm` is therefore only meaningful to the
/// function's own call sites, not to its callers.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    /// The function's overall sequence, every color folded together.
    pub combined: Seq,
    /// Per-communicator sequence, MPI mode only.
    pub per_comm: BTreeMap<Value, Seq>,
}

impl Default for Seq {
    fn default() -> Self {
        Seq::Known(Vec::new())
    }
}

/// Every function's summary, plus the per-block sequences computed along
/// the way (consumed directly by the divergence checker).
#[derive(Default)]
pub struct CollectiveSummaries {
    summaries: HashMap<FuncId, Summary>,
    block_seq: HashMap<(FuncId, Block), Seq>,
    block_per_comm: HashMap<(FuncId, Block), BTreeMap<Value, Seq>>,
}

impl CollectiveSummaries {
    /// The summary for `f`, if it was processed (declarations and
    /// functions unreachable from any exit have none).
    pub fn of(&self, f: FuncId) -> Option<&Summary> {
        self.summaries.get(&f)
    }

    /// The combined (comm-agnostic) sequence at `block`.
    pub fn block_seq(&self, func: FuncId, block: Block) -> Option<&Seq> {
        self.block_seq.get(&(func, block))
    }

    /// The per-communicator sequence at `block`, MPI mode only.
    pub fn block_per_comm(&self, func: FuncId, block: Block) -> Option<&BTreeMap<Value, Seq>> {
        self.block_per_comm.get(&(func, block))
    }
}

pub(crate) fn resolved_callees(
    func: &Function,
    inst: Inst,
    call_graph: &dyn CallGraphTrait,
) -> BTreeSet<FuncId> {
    let InstructionData::Call { callee, .. } = func.dfg.inst(inst) else {
        return BTreeSet::new();
    };
    match callee {
        Callee::Direct(f) => std::iter::once(*f).collect(),
        Callee::Indirect(_) => call_graph.callees(inst),
    }
}

fn is_finalizer(func: &Function, inst: Inst, module: &Module, call_graph: &dyn CallGraphTrait) -> bool {
    resolved_callees(func, inst, call_graph)
        .iter()
        .any(|f| matches!(module.func(*f).name.as_str(), "MPI_Finalize" | "MPI_Abort" | "abort"))
}

/// The collective color and (MPI-mode) communicator key of a call, if it
/// calls a known collective directly or through a uniquely-resolved
/// indirect callee.
pub(crate) fn collective_call(
    func: &Function,
    inst: Inst,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
) -> Option<(CollectiveColor, Option<Value>)> {
    let InstructionData::Call { args, .. } = func.dfg.inst(inst) else {
        return None;
    };
    let callees = resolved_callees(func, inst, call_graph);
    let f = callees.iter().find(|f| collectives.is_collective(**f))?;
    let color = collectives.color(*f)?;
    let key = collectives
        .comm_arg_index(color)
        .and_then(|i| args.get(i).copied());
    Some((color, key))
}

/// Exit blocks: those containing a return or a process-terminating call.
fn exit_blocks(
    func: &Function,
    module: &Module,
    call_graph: &dyn CallGraphTrait,
) -> BTreeSet<Block> {
    let mut exits = BTreeSet::new();
    for block in func.layout.blocks() {
        for &inst in func.layout.block_insts(block) {
            let is_return = matches!(func.dfg.inst(inst), InstructionData::Return { .. });
            if is_return || is_finalizer(func, inst, module, call_graph) {
                exits.insert(block);
            }
        }
    }
    exits
}

/// Groups blocks by the header of their innermost loop (self-inclusive:
/// a header is a member of its own body).
fn loop_bodies(func: &Function, dominance: &dyn DominanceInfo) -> HashMap<Block, BTreeSet<Block>> {
    let mut bodies: HashMap<Block, BTreeSet<Block>> = HashMap::new();
    for block in func.layout.blocks() {
        if let Some(header) = dominance.loop_header(block) {
            bodies.entry(header).or_default().insert(block);
            bodies.entry(header).or_default().insert(header);
        }
    }
    bodies
}

#[allow(clippy::too_many_arguments)]
fn compute_block(
    func: &Function,
    block: Block,
    succs: &[Block],
    seq: &HashMap<Block, Seq>,
    module: &Module,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
    key: Option<Value>,
    summaries: &HashMap<FuncId, Summary>,
) -> Seq {
    let mut candidates = Vec::new();
    for &s in succs {
        let mut acc = seq.get(&s).cloned().unwrap_or_else(Seq::empty);
        for &inst in func.layout.block_insts(block).iter().rev() {
            if !func.dfg.inst(inst).is_call() {
                continue;
            }
            if let Some((color, call_key)) = collective_call(func, inst, call_graph, collectives) {
                if key.is_none() || call_key == key {
                    acc = acc.prepend_color(color);
                }
                continue;
            }
            for callee in resolved_callees(func, inst, call_graph) {
                if module.func(callee).is_declaration() {
                    continue;
                }
                let Some(summary) = summaries.get(&callee) else {
                    continue;
                };
                let contribution = match key {
                    None => summary.combined.clone(),
                    Some(k) => match summary.per_comm.get(&k) {
                        Some(s) => s.clone(),
                        None => continue,
                    },
                };
                if !matches!(contribution, Seq::Known(ref v) if v.is_empty()) {
                    acc = acc.prepend_seq(contribution);
                }
            }
        }
        candidates.push(acc);
    }
    if candidates.is_empty() {
        return Seq::empty();
    }
    let first = candidates[0].clone();
    if candidates.iter().all(|c| *c == first) {
        first
    } else {
        Seq::Navs
    }
}

/// The "mustWait" reverse-BFS: visits a block only once every in-scope
/// successor has a finalized sequence. `skip` blocks (loop latches) are
/// excluded entirely; their contribution was already folded by the loop
/// pre-pass that seeded `seq`.
#[allow(clippy::too_many_arguments)]
fn reverse_bfs(
    func: &Function,
    cfg: &ControlFlowGraph,
    scope: &BTreeSet<Block>,
    skip: &BTreeSet<Block>,
    exits: &BTreeSet<Block>,
    mut seq: HashMap<Block, Seq>,
    module: &Module,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
    key: Option<Value>,
    summaries: &HashMap<FuncId, Summary>,
) -> HashMap<Block, Seq> {
    let mut pending: HashMap<Block, BTreeSet<Block>> = HashMap::new();
    for &b in scope {
        if skip.contains(&b) || seq.contains_key(&b) {
            continue;
        }
        let succs: BTreeSet<Block> = cfg
            .succs(b)
            .iter()
            .copied()
            .filter(|s| scope.contains(s) && !skip.contains(s))
            .collect();
        pending.insert(b, succs);
    }

    let mut queue: VecDeque<Block> = VecDeque::new();
    for &b in exits {
        if scope.contains(&b) && !skip.contains(&b) {
            seq.entry(b).or_insert_with(Seq::empty);
        }
    }
    for (&b, s) in &seq {
        if scope.contains(&b) {
            queue.push_back(b);
            let _ = s;
        }
    }

    while let Some(x) = queue.pop_front() {
        for (p, _) in cfg.preds(x) {
            let p = *p;
            if !scope.contains(&p) || skip.contains(&p) || seq.contains_key(&p) {
                continue;
            }
            let Some(remaining) = pending.get_mut(&p) else {
                continue;
            };
            remaining.remove(&x);
            if remaining.is_empty() {
                let succs: Vec<Block> = cfg
                    .succs(p)
                    .iter()
                    .copied()
                    .filter(|s| scope.contains(s) && !skip.contains(s))
                    .collect();
                let computed = compute_block(
                    func, p, &succs, &seq, module, call_graph, collectives, key, summaries,
                );
                seq.insert(p, computed);
                queue.push_back(p);
            }
        }
    }

    seq
}

/// Step 1: for every natural loop, decide whether its cross-iteration
/// behavior is consistent. Where it is not, every block in the loop
/// body is forced to `NAVS` up front rather than computed precisely —
/// a bounded, defensible approximation of "the loop's internal sequence
/// already disagrees with itself" that avoids modeling true fixed-point
/// iteration over the loop body.
#[allow(clippy::too_many_arguments)]
fn loop_prepass(
    func: &Function,
    cfg: &ControlFlowGraph,
    dominance: &dyn DominanceInfo,
    module: &Module,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
    key: Option<Value>,
    summaries: &HashMap<FuncId, Summary>,
) -> (HashMap<Block, Seq>, BTreeSet<Block>) {
    let bodies = loop_bodies(func, dominance);
    let mut forced_navs = HashMap::new();
    let mut latches = BTreeSet::new();

    for (&header, body) in &bodies {
        let body_latches: BTreeSet<Block> = cfg
            .preds(header)
            .iter()
            .map(|(p, _)| *p)
            .filter(|p| body.contains(p) && *p != header)
            .collect();
        latches.extend(body_latches.iter().copied());

        let seeded: HashMap<Block, Seq> = std::iter::once((header, Seq::empty())).collect();
        let no_skip: BTreeSet<Block> = BTreeSet::new();
        let pseudo_exit: BTreeSet<Block> = std::iter::once(header).collect();
        let inner = reverse_bfs(
            func,
            cfg,
            body,
            &no_skip,
            &pseudo_exit,
            seeded,
            module,
            call_graph,
            collectives,
            key,
            summaries,
        );

        let latch_results: Vec<Seq> = body_latches
            .iter()
            .filter_map(|l| inner.get(l).cloned())
            .collect();
        let dirty = latch_results.is_empty()
            || latch_results.iter().any(|s| matches!(s, Seq::Navs))
            || !latch_results.windows(2).all(|w| w[0] == w[1]);

        if dirty {
            for &b in body {
                forced_navs.insert(b, Seq::Navs);
            }
        }
    }

    (forced_navs, latches)
}

/// Compute the collective summary of every function in `module`,
/// processing functions in an order that guarantees a callee's summary
/// is ready before any caller needs it.
pub fn build(
    module: &Module,
    contexts: &HashMap<FuncId, FunctionContext>,
    depgraph: &DepGraph,
    call_graph: &dyn CallGraphTrait,
    collectives: &dyn CollectiveTable,
) -> CollectiveSummaries {
    let order = reverse_topological_order(module, depgraph);
    let mut summaries: HashMap<FuncId, Summary> = HashMap::new();
    let mut block_seq = HashMap::new();
    let mut block_per_comm = HashMap::new();

    for func_id in order {
        let func = module.func(func_id);
        let Some(ctx) = contexts.get(&func_id) else {
            continue;
        };
        let Some(entry) = func.entry_block() else {
            continue;
        };
        let exits = exit_blocks(func, module, call_graph);
        if exits.is_empty() {
            continue;
        }
        let scope: BTreeSet<Block> = func.layout.blocks().collect();

        let comm_keys: BTreeSet<Value> = func
            .dfg
            .all_insts()
            .filter_map(|inst| collective_call(func, inst, call_graph, collectives))
            .filter_map(|(_, key)| key)
            .collect();

        let (forced, latches) = loop_prepass(
            func,
            ctx.cfg,
            ctx.dominance,
            module,
            call_graph,
            collectives,
            None,
            &summaries,
        );
        let combined_seq = reverse_bfs(
            func, ctx.cfg, &scope, &latches, &exits, forced, module, call_graph, collectives,
            None, &summaries,
        );

        let mut per_comm_entry: BTreeMap<Value, Seq> = BTreeMap::new();
        let mut per_comm_blocks: HashMap<Block, BTreeMap<Value, Seq>> = HashMap::new();
        for &comm in &comm_keys {
            let (forced, latches) = loop_prepass(
                func,
                ctx.cfg,
                ctx.dominance,
                module,
                call_graph,
                collectives,
                Some(comm),
                &summaries,
            );
            let per_comm_seq = reverse_bfs(
                func,
                ctx.cfg,
                &scope,
                &latches,
                &exits,
                forced,
                module,
                call_graph,
                collectives,
                Some(comm),
                &summaries,
            );
            if let Some(entry_seq) = per_comm_seq.get(&entry) {
                per_comm_entry.insert(comm, entry_seq.clone());
            }
            for (&b, s) in &per_comm_seq {
                per_comm_blocks.entry(b).or_default().insert(comm, s.clone());
            }
        }

        for (&b, s) in &combined_seq {
            block_seq.insert((func_id, b), s.clone());
        }
        for (b, m) in per_comm_blocks {
            block_per_comm.insert((func_id, b), m);
        }

        let combined = combined_seq
            .get(&entry)
            .cloned()
            .unwrap_or_else(Seq::empty);
        summaries.insert(
            func_id,
            Summary {
                combined,
                per_comm: per_comm_entry,
            },
        );
    }

    CollectiveSummaries {
        summaries,
        block_seq,
        block_per_comm,
    }
}

/// Functions in an order such that every callee precedes its callers
/// (Tarjan's SCC algorithm over the call graph; a component is emitted
/// as soon as its own DFS finishes, which happens before the caller that
/// reached it finishes its own). Functions in a cycle (mutual or direct
/// recursion) are emitted together in an arbitrary order within the
/// cycle — calls within the cycle see no summary yet for each other and
/// are treated as non-collective contributions (this analysis does not specify
/// recursive-call semantics; this is the documented fallback).
fn reverse_topological_order(module: &Module, depgraph: &DepGraph) -> Vec<FuncId> {
    let mut edges: HashMap<FuncId, BTreeSet<FuncId>> = HashMap::new();
    for func_id in module.func_ids() {
        let callees: BTreeSet<FuncId> = depgraph
            .call_nodes_of(func_id)
            .flat_map(|c| depgraph.callees_of(c))
            .collect();
        edges.insert(func_id, callees);
    }

    struct Tarjan<'a> {
        edges: &'a HashMap<FuncId, BTreeSet<FuncId>>,
        index: HashMap<FuncId, usize>,
        low: HashMap<FuncId, usize>,
        on_stack: BTreeSet<FuncId>,
        stack: Vec<FuncId>,
        next_index: usize,
        order: Vec<FuncId>,
    }

    impl<'a> Tarjan<'a> {
        fn visit(&mut self, v: FuncId) {
            self.index.insert(v, self.next_index);
            self.low.insert(v, self.next_index);
            self.next_index += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            if let Some(callees) = self.edges.get(&v) {
                for &w in callees {
                    if !self.index.contains_key(&w) {
                        self.visit(w);
                        let low_w = self.low[&w];
                        self.low.insert(v, self.low[&v].min(low_w));
                    } else if self.on_stack.contains(&w) {
                        let idx_w = self.index[&w];
                        self.low.insert(v, self.low[&v].min(idx_w));
                    }
                }
            }

            if self.low[&v] == self.index[&v] {
                loop {
                    let w = self.stack.pop().expect("component non-empty");
                    self.on_stack.remove(&w);
                    self.order.push(w);
                    if w == v {
                        break;
                    }
                }
            }
        }
    }

    let mut tarjan = Tarjan {
        edges: &edges,
        index: HashMap::new(),
        low: HashMap::new(),
        on_stack: BTreeSet::new(),
        stack: Vec::new(),
        next_index: 0,
        order: Vec::new(),
    };
    for func_id in module.func_ids() {
        if !tarjan.index.contains_key(&func_id) {
            tarjan.visit(func_id);
        }
    }
    tarjan.order
}
