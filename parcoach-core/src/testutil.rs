//! Hand-built collaborator fakes and a real (if unoptimized) dominance
//! implementation, used only by this crate's own unit and integration
//! tests. None of this ships outside `#[cfg(test)]`: computing dominance,
//! points-to sets, and call graphs is out of scope for this crate —
//! production callers supply their own.

use crate::regions::Region;
use parcoach_entity::EntityRef;
use parcoach_ir::{
    AllocSite, Block, CallGraph as CallGraphTrait, CollectiveColor, CollectiveTable,
    ControlFlowGraph, DominanceInfo, FuncId, Function, Inst, ModRefOracle, PointsToAnalysis, Value,
};
use std::collections::{BTreeSet, HashMap};

/// A dominator/post-dominator tree computed by the textbook iterative
/// data-flow algorithm (not Lengauer-Tarjan; test graphs are tiny, and
/// clarity matters more than asymptotics here).
pub struct SimpleDominance {
    dom: HashMap<Block, BTreeSet<Block>>,
    idom: HashMap<Block, Option<Block>>,
    children: HashMap<Block, Vec<Block>>,
    frontier: HashMap<Block, BTreeSet<Block>>,
    postdom: HashMap<Block, BTreeSet<Block>>,
    post_idom: HashMap<Block, Option<Block>>,
    post_frontier: HashMap<Block, BTreeSet<Block>>,
    loop_header_of: HashMap<Block, Block>,
}

impl SimpleDominance {
    /// Compute dominance and post-dominance for `func`, whose control
    /// flow is described by `cfg`.
    pub fn new(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let blocks: Vec<Block> = func.layout.blocks().collect();
        let entry = func.entry_block().expect("function has a body");

        let preds = |b: Block| -> Vec<Block> { cfg.preds(b).iter().map(|(p, _)| *p).collect() };
        let succs = |b: Block| -> Vec<Block> { cfg.succs(b).to_vec() };

        let dom = fixed_point_dominators(&blocks, entry, &preds);
        let idom = immediate_dominators(&blocks, entry, &dom);
        let children = dom_tree_children(&blocks, &idom);
        let frontier = dominance_frontier(&blocks, &preds, &idom);

        let exits: Vec<Block> = blocks
            .iter()
            .copied()
            .filter(|&b| succs(b).is_empty())
            .collect();
        let postdom = fixed_point_post_dominators(&blocks, &exits, &succs);
        let post_idom = immediate_post_dominators(&blocks, &exits, &postdom);
        let post_frontier = dominance_frontier(&blocks, &succs, &post_idom);

        let mut loop_header_of = HashMap::new();
        for &b in &blocks {
            for succ in succs(b) {
                if dom[&b].contains(&succ) {
                    // back edge b -> succ; succ is a loop header.
                    for member in natural_loop_body(succ, b, &preds) {
                        loop_header_of.entry(member).or_insert(succ);
                    }
                }
            }
        }

        Self {
            dom,
            idom,
            children,
            frontier,
            postdom,
            post_idom,
            post_frontier,
            loop_header_of,
        }
    }
}

impl DominanceInfo for SimpleDominance {
    fn dominates(&self, a: Block, b: Block) -> bool {
        self.dom.get(&b).is_some_and(|d| d.contains(&a))
    }

    fn dominance_frontier(&self, block: Block) -> BTreeSet<Block> {
        self.frontier.get(&block).cloned().unwrap_or_default()
    }

    fn post_dominates(&self, a: Block, b: Block) -> bool {
        self.postdom.get(&b).is_some_and(|d| d.contains(&a))
    }

    fn post_dominance_frontier(&self, block: Block) -> BTreeSet<Block> {
        self.post_frontier.get(&block).cloned().unwrap_or_default()
    }

    fn in_loop(&self, block: Block) -> bool {
        self.loop_header_of.contains_key(&block)
    }

    fn loop_header(&self, block: Block) -> Option<Block> {
        self.loop_header_of.get(&block).copied()
    }

    fn dom_tree_children(&self, block: Block) -> Vec<Block> {
        self.children.get(&block).cloned().unwrap_or_default()
    }
}

fn fixed_point_dominators(
    blocks: &[Block],
    entry: Block,
    preds: &impl Fn(Block) -> Vec<Block>,
) -> HashMap<Block, BTreeSet<Block>> {
    let all: BTreeSet<Block> = blocks.iter().copied().collect();
    let mut dom: HashMap<Block, BTreeSet<Block>> = blocks
        .iter()
        .map(|&b| (b, if b == entry { [b].into() } else { all.clone() }))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &b in blocks {
            if b == entry {
                continue;
            }
            let mut new_dom = preds(b)
                .into_iter()
                .map(|p| dom[&p].clone())
                .reduce(|a, b| a.intersection(&b).copied().collect())
                .unwrap_or_default();
            new_dom.insert(b);
            if new_dom != dom[&b] {
                dom.insert(b, new_dom);
                changed = true;
            }
        }
    }
    dom
}

fn immediate_dominators(
    blocks: &[Block],
    entry: Block,
    dom: &HashMap<Block, BTreeSet<Block>>,
) -> HashMap<Block, Option<Block>> {
    blocks
        .iter()
        .map(|&b| {
            if b == entry {
                return (b, None);
            }
            let candidates: Vec<Block> = dom[&b].iter().copied().filter(|&d| d != b).collect();
            let idom = candidates
                .iter()
                .copied()
                .max_by_key(|d| dom[d].len())
                .filter(|_| !candidates.is_empty());
            (b, idom)
        })
        .collect()
}

fn dom_tree_children(
    blocks: &[Block],
    idom: &HashMap<Block, Option<Block>>,
) -> HashMap<Block, Vec<Block>> {
    let mut children: HashMap<Block, Vec<Block>> = HashMap::new();
    for &b in blocks {
        if let Some(Some(parent)) = idom.get(&b) {
            children.entry(*parent).or_default().push(b);
        }
    }
    children
}

fn dominance_frontier(
    blocks: &[Block],
    preds: &impl Fn(Block) -> Vec<Block>,
    idom: &HashMap<Block, Option<Block>>,
) -> HashMap<Block, BTreeSet<Block>> {
    let mut frontier: HashMap<Block, BTreeSet<Block>> =
        blocks.iter().map(|&b| (b, BTreeSet::new())).collect();
    for &b in blocks {
        let ps = preds(b);
        if ps.len() < 2 {
            continue;
        }
        for p in ps {
            let mut runner = p;
            while Some(runner) != idom[&b] {
                frontier.get_mut(&runner).unwrap().insert(b);
                match idom.get(&runner).copied().flatten() {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }
    frontier
}

fn fixed_point_post_dominators(
    blocks: &[Block],
    exits: &[Block],
    succs: &impl Fn(Block) -> Vec<Block>,
) -> HashMap<Block, BTreeSet<Block>> {
    let all: BTreeSet<Block> = blocks.iter().copied().collect();
    let exit_set: BTreeSet<Block> = exits.iter().copied().collect();
    let mut postdom: HashMap<Block, BTreeSet<Block>> = blocks
        .iter()
        .map(|&b| {
            (
                b,
                if exit_set.contains(&b) {
                    [b].into()
                } else {
                    all.clone()
                },
            )
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &b in blocks {
            if exit_set.contains(&b) {
                continue;
            }
            let mut new_pd = succs(b)
                .into_iter()
                .map(|s| postdom[&s].clone())
                .reduce(|a, b| a.intersection(&b).copied().collect())
                .unwrap_or_default();
            new_pd.insert(b);
            if new_pd != postdom[&b] {
                postdom.insert(b, new_pd);
                changed = true;
            }
        }
    }
    postdom
}

fn immediate_post_dominators(
    blocks: &[Block],
    exits: &[Block],
    postdom: &HashMap<Block, BTreeSet<Block>>,
) -> HashMap<Block, Option<Block>> {
    let exit_set: BTreeSet<Block> = exits.iter().copied().collect();
    blocks
        .iter()
        .map(|&b| {
            if exit_set.contains(&b) {
                return (b, None);
            }
            let candidates: Vec<Block> =
                postdom[&b].iter().copied().filter(|&d| d != b).collect();
            let ipd = candidates
                .iter()
                .copied()
                .max_by_key(|d| postdom[d].len())
                .filter(|_| !candidates.is_empty());
            (b, ipd)
        })
        .collect()
}

fn natural_loop_body(
    header: Block,
    latch: Block,
    preds: &impl Fn(Block) -> Vec<Block>,
) -> BTreeSet<Block> {
    let mut body = BTreeSet::new();
    body.insert(header);
    body.insert(latch);
    let mut stack = vec![latch];
    while let Some(b) = stack.pop() {
        for p in preds(b) {
            if body.insert(p) {
                stack.push(p);
            }
        }
    }
    body
}

/// A points-to fake: an explicit `Value -> Set<AllocSite>` table.
#[derive(Default)]
pub struct StaticPointsTo {
    table: HashMap<Value, BTreeSet<AllocSite>>,
}

impl StaticPointsTo {
    /// Record that `v` points to exactly `sites`.
    pub fn set(&mut self, v: Value, sites: impl IntoIterator<Item = AllocSite>) {
        self.table.insert(v, sites.into_iter().collect());
    }
}

impl PointsToAnalysis for StaticPointsTo {
    fn points_to(&self, v: Value) -> BTreeSet<AllocSite> {
        self.table.get(&v).cloned().unwrap_or_default()
    }

    fn all_allocation_sites(&self) -> BTreeSet<AllocSite> {
        self.table.values().flatten().copied().collect()
    }
}

/// A call-graph fake: an explicit `Inst -> Set<FuncId>` resolution table.
#[derive(Default)]
pub struct StaticCallGraph {
    callees: HashMap<Inst, BTreeSet<FuncId>>,
    reachable: HashMap<FuncId, BTreeSet<FuncId>>,
}

impl StaticCallGraph {
    /// Resolve an indirect call instruction to `targets`.
    pub fn set_callees(&mut self, inst: Inst, targets: impl IntoIterator<Item = FuncId>) {
        self.callees.insert(inst, targets.into_iter().collect());
    }

    /// Set the transitive reachability set used by `reachable_from`.
    pub fn set_reachable(&mut self, from: FuncId, targets: impl IntoIterator<Item = FuncId>) {
        self.reachable.insert(from, targets.into_iter().collect());
    }
}

impl CallGraphTrait for StaticCallGraph {
    fn callees(&self, inst: Inst) -> BTreeSet<FuncId> {
        self.callees.get(&inst).cloned().unwrap_or_default()
    }

    fn reachable_from(&self, from: FuncId) -> BTreeSet<FuncId> {
        self.reachable
            .get(&from)
            .cloned()
            .unwrap_or_else(|| [from].into())
    }
}

/// A mod/ref fake: explicit `FuncId -> Set<Region>` tables.
#[derive(Default)]
pub struct StaticModRef {
    modifies: HashMap<FuncId, BTreeSet<Region>>,
    references: HashMap<FuncId, BTreeSet<Region>>,
    external: HashMap<String, (BTreeSet<Region>, BTreeSet<Region>)>,
}

impl StaticModRef {
    /// Set the (transitive) regions `f` may write.
    pub fn set_modifies(&mut self, f: FuncId, regions: impl IntoIterator<Item = Region>) {
        self.modifies.insert(f, regions.into_iter().collect());
    }

    /// Set the (transitive) regions `f` may read.
    pub fn set_references(&mut self, f: FuncId, regions: impl IntoIterator<Item = Region>) {
        self.references.insert(f, regions.into_iter().collect());
    }

    /// Set the mod/ref summary for an external (library) callee name.
    pub fn set_external(
        &mut self,
        name: &str,
        modified: impl IntoIterator<Item = Region>,
        referenced: impl IntoIterator<Item = Region>,
    ) {
        self.external.insert(
            name.to_string(),
            (modified.into_iter().collect(), referenced.into_iter().collect()),
        );
    }
}

impl ModRefOracle<Region> for StaticModRef {
    fn modifies(&self, f: FuncId) -> BTreeSet<Region> {
        self.modifies.get(&f).cloned().unwrap_or_default()
    }

    fn references(&self, f: FuncId) -> BTreeSet<Region> {
        self.references.get(&f).cloned().unwrap_or_default()
    }

    fn external_mod_ref(&self, name: &str) -> (BTreeSet<Region>, BTreeSet<Region>) {
        self.external.get(name).cloned().unwrap_or_default()
    }
}

/// A collective-table fake: explicit per-function color/comm-index
/// entries.
#[derive(Default)]
pub struct StaticCollectiveTable {
    colors: HashMap<FuncId, CollectiveColor>,
    comm_arg: HashMap<CollectiveColor, usize>,
    rank_queries: HashMap<FuncId, usize>,
}

impl StaticCollectiveTable {
    /// Mark `f` as a collective of the given color.
    pub fn set_collective(&mut self, f: FuncId, color: CollectiveColor) {
        self.colors.insert(f, color);
    }

    /// Set the communicator argument index for a color.
    pub fn set_comm_arg_index(&mut self, color: CollectiveColor, index: usize) {
        self.comm_arg.insert(color, index);
    }

    /// Mark `f` as a rank query whose output argument is at `out_arg`.
    pub fn set_rank_query(&mut self, f: FuncId, out_arg: usize) {
        self.rank_queries.insert(f, out_arg);
    }
}

impl CollectiveTable for StaticCollectiveTable {
    fn is_collective(&self, f: FuncId) -> bool {
        self.colors.contains_key(&f)
    }

    fn color(&self, f: FuncId) -> Option<CollectiveColor> {
        self.colors.get(&f).copied()
    }

    fn comm_arg_index(&self, color: CollectiveColor) -> Option<usize> {
        self.comm_arg.get(&color).copied()
    }

    fn rank_query_out_arg(&self, f: FuncId) -> Option<usize> {
        self.rank_queries.get(&f).copied()
    }
}

/// Bundles one fake of each collaborator trait, for tests that need all
/// of them.
#[derive(Default)]
pub struct StaticCollaborators {
    /// Points-to fake.
    pub points_to: StaticPointsTo,
    /// Call-graph fake.
    pub call_graph: StaticCallGraph,
    /// Mod/ref fake.
    pub modref: StaticModRef,
    /// Collective-table fake.
    pub collectives: StaticCollectiveTable,
}

impl StaticCollaborators {
    /// An empty set of fakes; populate the fields before use.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Allocate a fresh [`FuncId`] for test fixtures, without needing a real
/// `Module`.
pub fn func_id(n: u32) -> FuncId {
    FuncId::new(n as usize)
}
