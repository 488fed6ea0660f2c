//! Mu/Chi annotation and memory-SSA construction.
//!
//! Both passes build the same per-function structure in one pass: Chi
//! placement decides where phi nodes are needed, and the rename walk
//! that fills in phi operands is the same walk that attaches Mu/Chi to
//! loads, stores, and call sites. Splitting them into two modules would
//! mean threading the same dominator-tree walk twice.

use crate::error::AnalysisError;
use crate::regions::RegionTable;
use parcoach_entity::{entity_impl, EntityRef, PrimaryMap, SecondaryMap};
use parcoach_ir::{
    Block, CallGraph as CallGraphTrait, Callee, ControlFlowGraph, DominanceInfo, FuncId,
    Function, Inst, InstructionData, ModRefOracle, PointsToAnalysis, Value,
};
use std::collections::{BTreeSet, HashMap};

use crate::regions::Region;

/// A versioned name of a region at a program point.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemVar(u32);
entity_impl!(MemVar, "mv");

/// What defines a `MemVar`.
#[derive(Clone, Debug)]
pub enum Def {
    /// Synthesized at function entry.
    Entry,
    /// Produced by a store's Chi.
    Store(Inst),
    /// Produced by a call site's Chi.
    Call(Inst),
    /// Produced at a block where multiple definitions merge.
    Phi(PhiInfo),
    /// Synthesized at the exit of a declaration with no body: the version
    /// a caller's Chi should chain off of for a region the declaration
    /// modifies, since there is no `Return` instruction to collect it from.
    Exit,
}

/// A memory phi: merges one incoming `MemVar` per predecessor edge, plus
/// the predicate Values that control which edge is taken.
#[derive(Clone, Debug, Default)]
pub struct PhiInfo {
    /// `(predecessor_block, incoming_memvar)` pairs, filled during rename.
    pub incoming: Vec<(Block, MemVar)>,
    /// Branch conditions controlling the predecessor edges that feed
    /// this phi (empty for an edge reached by an unconditional jump).
    pub predicates: BTreeSet<Value>,
}

#[derive(Clone)]
struct MemVarData {
    region: Region,
    version: u32,
    def: Def,
}

/// "Instruction I uses version v of region R."
#[derive(Clone, Copy, Debug)]
pub struct Mu {
    /// The region read.
    pub region: Region,
    /// The version read.
    pub var: MemVar,
}

/// "Instruction I updates R, defining v_new from v_old."
#[derive(Clone, Copy, Debug)]
pub struct Chi {
    /// The region written.
    pub region: Region,
    /// The version created.
    pub new_var: MemVar,
    /// The version it supersedes.
    pub old_var: MemVar,
}

/// Memory-SSA for a single function: every `MemVar`, and the Mu/Chi sets
/// attached to its instructions.
#[derive(Clone, Default)]
pub struct FunctionMemorySsa {
    vars: PrimaryMap<MemVar, MemVarData>,
    mu: SecondaryMap<Inst, Vec<Mu>>,
    chi: SecondaryMap<Inst, Vec<Chi>>,
    /// Mu set observed at the function's return sites, unioned across
    /// every return instruction (mirrors the single per-function map the
    /// algorithm this is grounded on keeps, rather than one per return).
    return_mu: Vec<Mu>,
    entry_chi: HashMap<Region, MemVar>,
}

impl FunctionMemorySsa {
    /// The region a `MemVar` versions.
    pub fn region_of(&self, var: MemVar) -> Region {
        self.vars[var].region
    }

    /// The version number of a `MemVar`, unique within this function and
    /// region.
    pub fn version_of(&self, var: MemVar) -> u32 {
        self.vars[var].version
    }

    /// What defines a `MemVar`.
    pub fn def_of(&self, var: MemVar) -> &Def {
        &self.vars[var].def
    }

    /// The Mu set attached to `inst` (loads and call sites).
    pub fn mu_of(&self, inst: Inst) -> &[Mu] {
        &self.mu[inst]
    }

    /// The Chi set attached to `inst` (stores and call sites).
    pub fn chi_of(&self, inst: Inst) -> &[Chi] {
        &self.chi[inst]
    }

    /// The function's synthesized entry Chi for `region`, if the
    /// function (or its transitive callees) touches it.
    pub fn entry_chi(&self, region: Region) -> Option<MemVar> {
        self.entry_chi.get(&region).copied()
    }

    /// Every region this function has an entry Chi for.
    pub fn entry_regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.entry_chi.keys().copied()
    }

    /// The Mu set observed at the function's return sites.
    pub fn return_mu(&self) -> &[Mu] {
        &self.return_mu
    }

    /// Every `MemVar` defined in this function.
    pub fn all_vars(&self) -> impl Iterator<Item = MemVar> + '_ {
        self.vars.keys()
    }

    /// If `phi` is a memory phi, replace every incoming occurrence of
    /// `old` with `new`. Used by phi-elimination when a merged-away
    /// phi was itself an operand of another phi.
    pub fn rewrite_phi_operand(&mut self, phi: MemVar, old: MemVar, new: MemVar) {
        if let Def::Phi(info) = &mut self.vars[phi].def {
            for (_, var) in info.incoming.iter_mut() {
                if *var == old {
                    *var = new;
                }
            }
        }
    }

    fn synthesize(&mut self, region: Region, next_version: &mut HashMap<Region, u32>) -> MemVar {
        log::warn!(
            "region r{} read before any Chi reached it; synthesizing an implicit entry version \
             (points-to/mod-ref oracle likely disagree on this region's reachability)",
            region.index()
        );
        let version = next_version.entry(region).or_insert(0);
        let var = self.vars.push(MemVarData {
            region,
            version: *version,
            def: Def::Entry,
        });
        *version += 1;
        var
    }
}

/// Whole-module memory-SSA: one `FunctionMemorySsa` per function with a
/// body (declarations get an entry Chi per touched region and an exit Chi
/// per modified region, but no phis or renaming, since they have no blocks
/// to rename over).
#[derive(Clone, Default)]
pub struct MemorySsa {
    functions: HashMap<FuncId, FunctionMemorySsa>,
}

impl MemorySsa {
    /// The memory-SSA for a function, if it has been built.
    pub fn of(&self, func: FuncId) -> Option<&FunctionMemorySsa> {
        self.functions.get(&func)
    }

    /// Mutable access, for phi-elimination rewriting phi operands
    /// in place after the dependency graph has already been built.
    pub fn of_mut(&mut self, func: FuncId) -> Option<&mut FunctionMemorySsa> {
        self.functions.get_mut(&func)
    }

    /// Assemble a whole-module `MemorySsa` from per-function results. The
    /// driver calls `build_function` once per function (each needs its
    /// own dominator tree) and hands the results here.
    pub fn from_functions(functions: HashMap<FuncId, FunctionMemorySsa>) -> Self {
        Self { functions }
    }
}

/// Build memory-SSA for a single function.
pub fn build_function(
    func_id: FuncId,
    func: &Function,
    cfg: &ControlFlowGraph,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    call_graph: &dyn CallGraphTrait,
    modref: &dyn ModRefOracle<Region>,
    dominance: &dyn DominanceInfo,
) -> Result<FunctionMemorySsa, AnalysisError> {
    let mut mssa = FunctionMemorySsa::default();

    let touched: BTreeSet<Region> = modref
        .modifies(func_id)
        .into_iter()
        .chain(modref.references(func_id))
        .collect();

    let mut next_version: HashMap<Region, u32> = HashMap::new();
    for &r in &touched {
        let version = next_version.entry(r).or_insert(0);
        let var = mssa.vars.push(MemVarData {
            region: r,
            version: *version,
            def: Def::Entry,
        });
        mssa.entry_chi.insert(r, var);
        *version += 1;
    }

    let Some(entry) = func.entry_block() else {
        // A declaration: no body to rename, but callers still need an exit
        // version per modified region to chain their own Chi against,
        // mirroring the `return_mu` a function with a body collects at its
        // `Return` instructions.
        for r in modref.modifies(func_id) {
            let version = next_version.entry(r).or_insert(0);
            let var = mssa.vars.push(MemVarData {
                region: r,
                version: *version,
                def: Def::Exit,
            });
            *version += 1;
            mssa.return_mu.push(Mu { region: r, var });
        }
        return Ok(mssa);
    };

    // --- Phi placement ---
    let mut def_blocks: HashMap<Region, BTreeSet<Block>> = HashMap::new();
    for &r in &touched {
        def_blocks.entry(r).or_default().insert(entry);
    }
    for block in func.layout.blocks() {
        for &inst in func.layout.block_insts(block) {
            match func.dfg.inst(inst) {
                InstructionData::Store { ptr, .. } => {
                    for r in regions.regions_of(&points_to.points_to(*ptr)) {
                        def_blocks.entry(r).or_default().insert(block);
                    }
                }
                InstructionData::Call { .. } => {
                    for callee in call_graph.callees(inst) {
                        for r in modref.modifies(callee) {
                            def_blocks.entry(r).or_default().insert(block);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let mut phi_at: HashMap<(Block, Region), MemVar> = HashMap::new();
    for (&r, sites) in &def_blocks {
        for block in iterated_dominance_frontier(sites, dominance) {
            phi_at.entry((block, r)).or_insert_with(|| {
                mssa.vars.push(MemVarData {
                    region: r,
                    version: 0, // assigned when rename reaches this block
                    def: Def::Phi(PhiInfo::default()),
                })
            });
        }
    }
    let mut phis_by_block: HashMap<Block, Vec<(Region, MemVar)>> = HashMap::new();
    for (&(block, r), &var) in &phi_at {
        phis_by_block.entry(block).or_default().push((r, var));
    }

    // --- Rename ---
    let mut stack: HashMap<Region, Vec<MemVar>> = HashMap::new();
    for (&r, &var) in &mssa.entry_chi {
        stack.entry(r).or_default().push(var);
    }

    rename_block(
        entry,
        func,
        cfg,
        regions,
        points_to,
        call_graph,
        modref,
        dominance,
        &phis_by_block,
        &mut next_version,
        &mut stack,
        &mut mssa,
    );

    Ok(mssa)
}

#[allow(clippy::too_many_arguments)]
fn rename_block(
    block: Block,
    func: &Function,
    cfg: &ControlFlowGraph,
    regions: &RegionTable,
    points_to: &dyn PointsToAnalysis,
    call_graph: &dyn CallGraphTrait,
    modref: &dyn ModRefOracle<Region>,
    dominance: &dyn DominanceInfo,
    phis_by_block: &HashMap<Block, Vec<(Region, MemVar)>>,
    next_version: &mut HashMap<Region, u32>,
    stack: &mut HashMap<Region, Vec<MemVar>>,
    mssa: &mut FunctionMemorySsa,
) {
    let mut pushed: HashMap<Region, u32> = HashMap::new();

    if let Some(phis) = phis_by_block.get(&block) {
        for &(r, var) in phis {
            let version = next_version.entry(r).or_insert(0);
            mssa.vars[var].version = *version;
            *version += 1;
            stack.entry(r).or_default().push(var);
            *pushed.entry(r).or_insert(0) += 1;
        }
    }

    for &inst in func.layout.block_insts(block) {
        match func.dfg.inst(inst) {
            InstructionData::Load { ptr } => {
                let ptr = *ptr;
                let mut mus = Vec::new();
                for r in regions.regions_of(&points_to.points_to(ptr)) {
                    let var = top_or_synthesize(r, stack, next_version, mssa);
                    mus.push(Mu { region: r, var });
                }
                mssa.mu[inst] = mus;
            }
            InstructionData::Store { ptr, .. } => {
                let ptr = *ptr;
                let mut chis = Vec::new();
                for r in regions.regions_of(&points_to.points_to(ptr)) {
                    let old_var = top_or_synthesize(r, stack, next_version, mssa);
                    let new_var = push_fresh(r, Def::Store(inst), next_version, stack, mssa);
                    *pushed.entry(r).or_insert(0) += 1;
                    chis.push(Chi {
                        region: r,
                        new_var,
                        old_var,
                    });
                }
                mssa.chi[inst] = chis;
            }
            InstructionData::Call { callee, .. } => {
                let callee = *callee;
                let callees: BTreeSet<FuncId> = match callee {
                    Callee::Direct(f) => std::iter::once(f).collect(),
                    Callee::Indirect(_) => call_graph.callees(inst),
                };
                if callees.is_empty() {
                    log::warn!(
                        "unresolved indirect call {inst} with an empty callee set: \
                         no memory effects modeled, summary becomes approximate"
                    );
                }
                let mut ref_regions = BTreeSet::new();
                let mut mod_regions = BTreeSet::new();
                for &f in &callees {
                    ref_regions.extend(modref.references(f));
                    mod_regions.extend(modref.modifies(f));
                }
                let mut mus = Vec::new();
                for r in &ref_regions {
                    let var = top_or_synthesize(*r, stack, next_version, mssa);
                    mus.push(Mu { region: *r, var });
                }
                mssa.mu[inst] = mus;
                let mut chis = Vec::new();
                for r in &mod_regions {
                    let old_var = top_or_synthesize(*r, stack, next_version, mssa);
                    let new_var = push_fresh(*r, Def::Call(inst), next_version, stack, mssa);
                    *pushed.entry(*r).or_insert(0) += 1;
                    chis.push(Chi {
                        region: *r,
                        new_var,
                        old_var,
                    });
                }
                mssa.chi[inst] = chis;
            }
            InstructionData::Return { .. } => {
                for (&r, s) in stack.iter() {
                    if let Some(&top) = s.last() {
                        mssa.return_mu.push(Mu { region: r, var: top });
                    }
                }
            }
            _ => {}
        }
    }

    let terminator_cond = func.layout.terminator(block).and_then(|t| {
        match func.dfg.inst(t) {
            InstructionData::Branch { cond, .. } => Some(*cond),
            _ => None,
        }
    });
    for succ in cfg.succs(block).to_vec() {
        if let Some(phis) = phis_by_block.get(&succ) {
            for &(r, var) in phis {
                if let Some(&top) = stack.get(&r).and_then(|s| s.last()) {
                    if let Def::Phi(info) = &mut mssa.vars[var].def {
                        info.incoming.push((block, top));
                        if let Some(p) = terminator_cond {
                            info.predicates.insert(p);
                        }
                    }
                }
            }
        }
    }

    for child in dominance.dom_tree_children(block) {
        rename_block(
            child,
            func,
            cfg,
            regions,
            points_to,
            call_graph,
            modref,
            dominance,
            phis_by_block,
            next_version,
            stack,
            mssa,
        );
    }

    for (r, count) in pushed {
        let s = stack.get_mut(&r).expect("pushed implies present");
        for _ in 0..count {
            s.pop();
        }
    }
}

fn push_fresh(
    region: Region,
    def: Def,
    next_version: &mut HashMap<Region, u32>,
    stack: &mut HashMap<Region, Vec<MemVar>>,
    mssa: &mut FunctionMemorySsa,
) -> MemVar {
    let version = next_version.entry(region).or_insert(0);
    let var = mssa.vars.push(MemVarData {
        region,
        version: *version,
        def,
    });
    *version += 1;
    stack.entry(region).or_default().push(var);
    var
}

fn top_or_synthesize(
    region: Region,
    stack: &mut HashMap<Region, Vec<MemVar>>,
    next_version: &mut HashMap<Region, u32>,
    mssa: &mut FunctionMemorySsa,
) -> MemVar {
    if let Some(&top) = stack.get(&region).and_then(|s| s.last()) {
        return top;
    }
    let var = mssa.synthesize(region, next_version);
    stack.entry(region).or_default().push(var);
    var
}

/// The iterated dominance frontier of a set of blocks: the fixed point
/// of repeatedly unioning in the dominance frontier of every block
/// already in the result.
fn iterated_dominance_frontier(
    sites: &BTreeSet<Block>,
    dominance: &dyn DominanceInfo,
) -> BTreeSet<Block> {
    let mut result = BTreeSet::new();
    let mut worklist: Vec<Block> = sites.iter().copied().collect();
    while let Some(block) = worklist.pop() {
        for df_block in dominance.dominance_frontier(block) {
            if result.insert(df_block) {
                worklist.push(df_block);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{SimpleDominance, StaticCollaborators};
    use parcoach_entity::EntityRef;
    use parcoach_ir::builder::FunctionBuilder;
    use parcoach_ir::CmpOp;

    #[test]
    fn load_gets_a_mu_and_store_gets_a_chi() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        b.switch_to_block(entry);
        let ptr = b.ins_const(0);
        let one = b.ins_const(1);
        let loaded = b.ins_load(ptr);
        b.ins_store(ptr, one);
        b.ins_return(vec![loaded]);
        let func = b.finish();

        let cfg = ControlFlowGraph::compute(&func);
        let fid = FuncId::new(0);
        let mut collab = StaticCollaborators::new();
        collab.modref.set_references(fid, [crate::regions::Region::new(0)]);
        collab.modref.set_modifies(fid, [crate::regions::Region::new(0)]);
        collab.points_to.set(ptr, [parcoach_ir::AllocSite::new(ptr)]);
        let mut regions = RegionTable::default();
        regions.region_for(parcoach_ir::AllocSite::new(ptr));
        let dominance = SimpleDominance::new(&func, &cfg);

        let mssa = build_function(
            fid, &func, &cfg, &regions, &collab.points_to, &collab.call_graph, &collab.modref,
            &dominance,
        )
        .unwrap();

        let insts: Vec<_> = func.layout.block_insts(entry).to_vec();
        let load_inst = insts[2];
        let store_inst = insts[3];
        assert_eq!(mssa.mu_of(load_inst).len(), 1);
        assert_eq!(mssa.chi_of(store_inst).len(), 1);
        let chi = mssa.chi_of(store_inst)[0];
        assert_ne!(chi.new_var, chi.old_var);
    }

    #[test]
    fn diverging_branch_produces_a_memory_phi() {
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
        let cfg = ControlFlowGraph::compute(&func);
        let fid = FuncId::new(0);
        let region = crate::regions::Region::new(0);
        let mut collab = StaticCollaborators::new();
        collab.modref.set_references(fid, [region]);
        collab.modref.set_modifies(fid, [region]);
        collab.points_to.set(ptr, [parcoach_ir::AllocSite::new(ptr)]);
        let mut regions_table = RegionTable::default();
        regions_table.region_for(parcoach_ir::AllocSite::new(ptr));
        let dominance = SimpleDominance::new(&func, &cfg);

        let mssa = build_function(
            fid,
            &func,
            &cfg,
            &regions_table,
            &collab.points_to,
            &collab.call_graph,
            &collab.modref,
            &dominance,
        )
        .unwrap();

        let join_load = func.layout.block_insts(join)[0];
        let mu = mssa.mu_of(join_load)[0];
        assert!(matches!(mssa.def_of(mu.var), Def::Phi(_)));
        if let Def::Phi(info) = mssa.def_of(mu.var) {
            assert_eq!(info.incoming.len(), 2);
        }
    }
}
