//! Self-contained collaborator implementations for standalone
//! command-line use: no external alias analysis, call graph, or
//! collective catalog is available, so this binary supplies its own.
//!
//! `parcoach-ir`'s trait docs are explicit that production code is
//! expected to bring these (`PointsToAnalysis`, `DominanceInfo`,
//! `CallGraph`, `ModRefOracle`, `CollectiveTable`); this module is that
//! production code for the CLI. Dominance follows the same iterative
//! data-flow algorithm as `parcoach-core`'s own test fixtures
//! (`SimpleDominance` in `parcoach-core::testutil`); the rest are
//! conservative, whole-module static approximations appropriate for a
//! single translation unit with no alias analysis behind it.

use log::warn;
use parcoach_core::Region;
use parcoach_ir::{
    AllocSite, Block, CallGraph as CallGraphTrait, Callee, CollectiveColor, CollectiveTable,
    ControlFlowGraph, DominanceInfo, FuncId, Function, InstructionData, Inst, ModRefOracle, Module,
    PointsToAnalysis, Value,
};
use std::collections::{BTreeSet, HashMap};

/// Every MPI collective this catalog recognizes, mapped to its
/// synchronization color. The communicator is assumed to be the first
/// argument for every entry, matching the convention this crate's own
/// textual frontend emits.
const MPI_COLLECTIVES: &[&str] = &[
    "MPI_Barrier",
    "MPI_Bcast",
    "MPI_Reduce",
    "MPI_Allreduce",
    "MPI_Gather",
    "MPI_Gatherv",
    "MPI_Scatter",
    "MPI_Scatterv",
    "MPI_Alltoall",
    "MPI_Allgather",
    "MPI_Scan",
];

const OMP_COLLECTIVES: &[&str] = &["omp_barrier", "omp_single", "omp_master"];
const UPC_COLLECTIVES: &[&str] = &["upc_barrier", "upc_notify", "upc_wait", "upc_all_broadcast"];
const CUDA_COLLECTIVES: &[&str] = &["__syncthreads", "cg_sync"];

/// `name -> (out-argument index)` for process-identity queries: the
/// taint source every downstream divergence actually flows from.
const RANK_QUERIES: &[(&str, usize)] = &[
    ("MPI_Comm_rank", 1),
    ("MPI_Group_rank", 1),
    ("upc_threadof", 1),
];

/// A catalog built once from a module's declared and defined function
/// names. Unknown names are simply not collectives; nothing here
/// inspects a call site's arguments.
pub struct NaiveCollectiveTable {
    colors: HashMap<FuncId, CollectiveColor>,
    rank_queries: HashMap<FuncId, usize>,
}

impl NaiveCollectiveTable {
    pub fn build(module: &Module) -> Self {
        let mut colors = HashMap::new();
        let mut rank_queries = HashMap::new();
        for f in module.func_ids() {
            let name = module.func(f).name.as_str();
            let color = if MPI_COLLECTIVES.contains(&name) {
                Some(CollectiveColor::Mpi)
            } else if OMP_COLLECTIVES.contains(&name) {
                Some(CollectiveColor::OpenMp)
            } else if UPC_COLLECTIVES.contains(&name) {
                Some(CollectiveColor::Upc)
            } else if CUDA_COLLECTIVES.contains(&name) {
                Some(CollectiveColor::Cuda)
            } else {
                None
            };
            if let Some(color) = color {
                colors.insert(f, color);
            }
            if let Some(&(_, out_arg)) = RANK_QUERIES.iter().find(|(n, _)| *n == name) {
                rank_queries.insert(f, out_arg);
            }
        }
        Self { colors, rank_queries }
    }
}

impl CollectiveTable for NaiveCollectiveTable {
    fn is_collective(&self, f: FuncId) -> bool {
        self.colors.contains_key(&f)
    }

    fn color(&self, f: FuncId) -> Option<CollectiveColor> {
        self.colors.get(&f).copied()
    }

    fn comm_arg_index(&self, color: CollectiveColor) -> Option<usize> {
        match color {
            CollectiveColor::Mpi => Some(0),
            CollectiveColor::OpenMp | CollectiveColor::Upc | CollectiveColor::Cuda => None,
        }
    }

    fn rank_query_out_arg(&self, f: FuncId) -> Option<usize> {
        self.rank_queries.get(&f).copied()
    }
}

/// Identity points-to: every value ever observed in a pointer position
/// (a load/store pointer operand, or an argument at a pointer-typed
/// parameter position) is treated as pointing only to itself. This is
/// unsound in the presence of real aliasing, but it is exactly the
/// approximation a single-pass, alias-analysis-free frontend can make
/// without guessing.
pub struct NaivePointsTo {
    sites: BTreeSet<AllocSite>,
}

impl NaivePointsTo {
    pub fn build(module: &Module) -> Self {
        let mut sites = BTreeSet::new();
        for f in module.func_ids() {
            let func = module.func(f);
            if func.is_declaration() {
                continue;
            }
            for inst in func.dfg.all_insts() {
                match func.dfg.inst(inst) {
                    InstructionData::Load { ptr } => {
                        sites.insert(AllocSite::new(*ptr));
                    }
                    InstructionData::Store { ptr, .. } => {
                        sites.insert(AllocSite::new(*ptr));
                    }
                    InstructionData::Call { callee, args, .. } => {
                        if let Callee::Direct(callee_id) = callee {
                            let pointer_params = &module.func(*callee_id).pointer_params;
                            for (i, arg) in args.iter().enumerate() {
                                if pointer_params.get(i).copied().unwrap_or(false) {
                                    sites.insert(AllocSite::new(*arg));
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Self { sites }
    }
}

impl PointsToAnalysis for NaivePointsTo {
    fn points_to(&self, v: Value) -> BTreeSet<AllocSite> {
        let site = AllocSite::new(v);
        if self.sites.contains(&site) {
            [site].into()
        } else {
            BTreeSet::new()
        }
    }

    fn all_allocation_sites(&self) -> BTreeSet<AllocSite> {
        self.sites.clone()
    }
}

/// A call graph read directly off the IR: direct calls resolve exactly,
/// indirect calls resolve to the empty set (logged once per call site).
pub struct NaiveCallGraph {
    callees: HashMap<Inst, BTreeSet<FuncId>>,
    adjacency: HashMap<FuncId, BTreeSet<FuncId>>,
}

impl NaiveCallGraph {
    pub fn build(module: &Module) -> Self {
        let mut callees = HashMap::new();
        let mut adjacency: HashMap<FuncId, BTreeSet<FuncId>> = HashMap::new();
        for f in module.func_ids() {
            let func = module.func(f);
            if func.is_declaration() {
                continue;
            }
            let targets = adjacency.entry(f).or_default();
            for inst in func.dfg.all_insts() {
                if let InstructionData::Call { callee, .. } = func.dfg.inst(inst) {
                    match callee {
                        Callee::Direct(callee_id) => {
                            callees.insert(inst, [*callee_id].into());
                            targets.insert(*callee_id);
                        }
                        Callee::Indirect(_) => {
                            warn!(
                                "{}: indirect call {inst} has no points-to-backed resolution; \
                                 treating as unresolved",
                                func.name
                            );
                            callees.insert(inst, BTreeSet::new());
                        }
                    }
                }
            }
        }
        Self { callees, adjacency }
    }
}

impl CallGraphTrait for NaiveCallGraph {
    fn callees(&self, inst: Inst) -> BTreeSet<FuncId> {
        self.callees.get(&inst).cloned().unwrap_or_default()
    }

    fn reachable_from(&self, from: FuncId) -> BTreeSet<FuncId> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(f) = stack.pop() {
            if !visited.insert(f) {
                continue;
            }
            if let Some(targets) = self.adjacency.get(&f) {
                stack.extend(targets.iter().copied());
            }
        }
        visited
    }
}

/// Direct mod/ref facts read off load/store pointer operands, folded
/// transitively over the call graph. A declaration has no body to read
/// these off of, so its direct effects are instead approximated at every
/// call site that targets it: each pointer-typed argument (per
/// `pointer_params`) is treated as both modified and referenced, the
/// standard "an opaque call may touch any pointer it was handed"
/// approximation.
pub struct NaiveModRef {
    modifies: HashMap<FuncId, BTreeSet<Region>>,
    references: HashMap<FuncId, BTreeSet<Region>>,
}

impl NaiveModRef {
    pub fn build(
        module: &Module,
        regions: &parcoach_core::RegionTable,
        points_to: &dyn PointsToAnalysis,
        call_graph: &NaiveCallGraph,
    ) -> Self {
        let mut direct_mod: HashMap<FuncId, BTreeSet<Region>> = HashMap::new();
        let mut direct_ref: HashMap<FuncId, BTreeSet<Region>> = HashMap::new();
        for f in module.func_ids() {
            let func = module.func(f);
            if func.is_declaration() {
                continue;
            }
            for inst in func.dfg.all_insts() {
                match func.dfg.inst(inst) {
                    InstructionData::Store { ptr, .. } => {
                        direct_mod
                            .entry(f)
                            .or_default()
                            .extend(regions.regions_of(&points_to.points_to(*ptr)));
                    }
                    InstructionData::Load { ptr } => {
                        direct_ref
                            .entry(f)
                            .or_default()
                            .extend(regions.regions_of(&points_to.points_to(*ptr)));
                    }
                    InstructionData::Call { callee, args, .. } => {
                        if let Callee::Direct(callee_id) = callee {
                            let callee_func = module.func(*callee_id);
                            if callee_func.is_declaration() {
                                let pointer_params = callee_func.pointer_params.clone();
                                for (i, arg) in args.iter().enumerate() {
                                    if !pointer_params.get(i).copied().unwrap_or(false) {
                                        continue;
                                    }
                                    let touched = regions.regions_of(&points_to.points_to(*arg));
                                    direct_mod.entry(*callee_id).or_default().extend(touched.iter().copied());
                                    direct_ref.entry(*callee_id).or_default().extend(touched);
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let mut modifies = HashMap::new();
        let mut references = HashMap::new();
        for f in module.func_ids() {
            let reached = call_graph.reachable_from(f);
            modifies.insert(
                f,
                reached.iter().flat_map(|g| direct_mod.get(g).cloned().unwrap_or_default()).collect(),
            );
            references.insert(
                f,
                reached.iter().flat_map(|g| direct_ref.get(g).cloned().unwrap_or_default()).collect(),
            );
        }
        Self { modifies, references }
    }
}

impl ModRefOracle<Region> for NaiveModRef {
    fn modifies(&self, f: FuncId) -> BTreeSet<Region> {
        self.modifies.get(&f).cloned().unwrap_or_default()
    }

    fn references(&self, f: FuncId) -> BTreeSet<Region> {
        self.references.get(&f).cloned().unwrap_or_default()
    }

    fn external_mod_ref(&self, _name: &str) -> (BTreeSet<Region>, BTreeSet<Region>) {
        // Unused by this oracle: `build` above already derives a
        // declaration's mod/ref regions per call site from its
        // `pointer_params`, so there is no name-keyed fallback to fall
        // back to.
        (BTreeSet::new(), BTreeSet::new())
    }
}

/// Dominator/post-dominator tree computed by the textbook iterative
/// data-flow algorithm. Clarity over asymptotics: the programs this CLI
/// analyzes are translation units, not codegen-scale functions.
pub struct NaiveDominance {
    dom: HashMap<Block, BTreeSet<Block>>,
    children: HashMap<Block, Vec<Block>>,
    frontier: HashMap<Block, BTreeSet<Block>>,
    postdom: HashMap<Block, BTreeSet<Block>>,
    post_frontier: HashMap<Block, BTreeSet<Block>>,
    loop_header_of: HashMap<Block, Block>,
}

impl NaiveDominance {
    pub fn new(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let blocks: Vec<Block> = func.layout.blocks().collect();
        let entry = func.entry_block().expect("function has a body");
        let preds = |b: Block| -> Vec<Block> { cfg.preds(b).iter().map(|(p, _)| *p).collect() };
        let succs = |b: Block| -> Vec<Block> { cfg.succs(b).to_vec() };

        let dom = fixed_point(&blocks, &[entry], &preds);
        let idom = immediate(&blocks, &[entry], &dom);
        let children = tree_children(&blocks, &idom);
        let frontier = frontier(&blocks, &preds, &idom);

        let exits: Vec<Block> = blocks.iter().copied().filter(|&b| succs(b).is_empty()).collect();
        let postdom = fixed_point(&blocks, &exits, &succs);
        let post_idom = immediate(&blocks, &exits, &postdom);
        let post_frontier = frontier(&blocks, &succs, &post_idom);

        let mut loop_header_of = HashMap::new();
        for &b in &blocks {
            for succ in succs(b) {
                if dom[&b].contains(&succ) {
                    for member in loop_body(succ, b, &preds) {
                        loop_header_of.entry(member).or_insert(succ);
                    }
                }
            }
        }

        Self { dom, children, frontier, postdom, post_frontier, loop_header_of }
    }
}

impl DominanceInfo for NaiveDominance {
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

fn fixed_point(
    blocks: &[Block],
    roots: &[Block],
    preds: &impl Fn(Block) -> Vec<Block>,
) -> HashMap<Block, BTreeSet<Block>> {
    let all: BTreeSet<Block> = blocks.iter().copied().collect();
    let root_set: BTreeSet<Block> = roots.iter().copied().collect();
    let mut dom: HashMap<Block, BTreeSet<Block>> = blocks
        .iter()
        .map(|&b| (b, if root_set.contains(&b) { [b].into() } else { all.clone() }))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for &b in blocks {
            if root_set.contains(&b) {
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

fn immediate(
    blocks: &[Block],
    roots: &[Block],
    dom: &HashMap<Block, BTreeSet<Block>>,
) -> HashMap<Block, Option<Block>> {
    let root_set: BTreeSet<Block> = roots.iter().copied().collect();
    blocks
        .iter()
        .map(|&b| {
            if root_set.contains(&b) {
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

fn tree_children(
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

fn frontier(
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

fn loop_body(header: Block, latch: Block, preds: &impl Fn(Block) -> Vec<Block>) -> BTreeSet<Block> {
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
