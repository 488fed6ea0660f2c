//! Stable trait seams for the services this crate consumes but never
//! computes itself: pointer analysis, dominance, call graph resolution,
//! mod/ref summaries, and collective tables.
//!
//! None of these traits is implemented here. Production code supplies
//! implementations backed by whatever alias/points-to analysis, call
//! graph, and collective catalog the host toolchain already has; test
//! code supplies small hand-built ones (see the `builder` module and
//! `parcoach-core`'s test fixtures).

use crate::entities::{AllocSite, FuncId, Value};
use std::collections::BTreeSet;

/// Points-to facts for top-level SSA values.
pub trait PointsToAnalysis {
    /// The set of allocation sites `v` may point to. Empty for a value
    /// that is never a pointer.
    fn points_to(&self, v: Value) -> BTreeSet<AllocSite>;

    /// Every allocation site in the module, regardless of whether any
    /// live value currently points to it. Used to size region tables.
    fn all_allocation_sites(&self) -> BTreeSet<AllocSite>;
}

/// Dominance, post-dominance, and loop structure for a single function.
pub trait DominanceInfo {
    /// Does `a` dominate `b`? A block dominates itself.
    fn dominates(&self, a: crate::entities::Block, b: crate::entities::Block) -> bool;

    /// The dominance frontier of `block`: blocks dominated by a
    /// predecessor of `block` but not by `block` itself.
    fn dominance_frontier(&self, block: crate::entities::Block) -> BTreeSet<crate::entities::Block>;

    /// Does `a` post-dominate `b`? A block post-dominates itself.
    fn post_dominates(&self, a: crate::entities::Block, b: crate::entities::Block) -> bool;

    /// The post-dominance frontier of `block`: the set of blocks whose
    /// divergent successors `block` does not post-dominate uniformly.
    fn post_dominance_frontier(
        &self,
        block: crate::entities::Block,
    ) -> BTreeSet<crate::entities::Block>;

    /// Whether `block` lies inside a natural loop.
    fn in_loop(&self, block: crate::entities::Block) -> bool;

    /// The header block of the innermost loop containing `block`, if any.
    fn loop_header(&self, block: crate::entities::Block) -> Option<crate::entities::Block>;

    /// The immediate children of `block` in the dominator tree.
    fn dom_tree_children(&self, block: crate::entities::Block) -> Vec<crate::entities::Block>;

    /// Blocks in dominator-tree pre-order starting at `entry`. Memory-SSA
    /// renaming relies on this order: a block's version stack must be
    /// fully populated by its dominator before it is visited.
    fn dom_tree_preorder(&self, entry: crate::entities::Block) -> Vec<crate::entities::Block> {
        let mut order = Vec::new();
        let mut stack = vec![entry];
        while let Some(block) = stack.pop() {
            order.push(block);
            let mut children = self.dom_tree_children(block);
            children.reverse();
            stack.extend(children);
        }
        order
    }
}

/// Call graph with indirect-call resolution.
pub trait CallGraph {
    /// The set of functions a call instruction may invoke. For a direct
    /// call this is always a single function; for an indirect call it is
    /// whatever the points-to analysis resolved the callee value to.
    fn callees(&self, inst: crate::entities::Inst) -> BTreeSet<FuncId>;

    /// Every function transitively reachable from `from`, `from`
    /// included.
    fn reachable_from(&self, from: FuncId) -> BTreeSet<FuncId>;
}

/// A memory region: an equivalence class of allocation sites that the
/// analysis versions together. `parcoach-core` owns the concrete type;
/// this trait lets `parcoach-ir` name it abstractly.
pub trait Region: Copy + Eq + Ord {}

/// Transitive mod/ref summaries, keyed by an opaque region type `R`.
pub trait ModRefOracle<R: Region> {
    /// Regions `f` (or anything it transitively calls) may write.
    fn modifies(&self, f: FuncId) -> BTreeSet<R>;

    /// Regions `f` (or anything it transitively calls) may read.
    fn references(&self, f: FuncId) -> BTreeSet<R>;

    /// Mod/ref summary for a library call with no module-local body,
    /// keyed by callee name (`memcpy`, `memset`, `MPI_Send`, ...).
    fn external_mod_ref(&self, name: &str) -> (BTreeSet<R>, BTreeSet<R>);
}

/// A collective operation's synchronization color: all ranks in the same
/// communicator must observe calls of the same color in the same
/// relative order. `MpiRankGuarded` calls additionally condition the
/// divergence check on whether the same rank-query value was compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectiveColor {
    /// MPI collectives: `MPI_Barrier`, `MPI_Bcast`, `MPI_Allreduce`, ...
    Mpi,
    /// OpenMP barriers and worksharing constructs.
    OpenMp,
    /// UPC barriers and collectives.
    Upc,
    /// CUDA `__syncthreads` and cooperative-groups barriers.
    Cuda,
}

/// Whether a function is a known collective, and if so, which
/// communicator argument its divergence is scoped to.
pub trait CollectiveTable {
    /// Is `f` itself a collective operation (as opposed to merely calling
    /// one transitively)?
    fn is_collective(&self, f: FuncId) -> bool;

    /// The collective's synchronization color.
    fn color(&self, f: FuncId) -> Option<CollectiveColor>;

    /// The index of the call's communicator/team argument, used to group
    /// collectives that must agree with each other. `None` when the
    /// color has no communicator argument (e.g. CUDA block-wide
    /// barriers).
    fn comm_arg_index(&self, color: CollectiveColor) -> Option<usize>;

    /// If `f` is a process-identity query (`MPI_Comm_rank`,
    /// `MPI_Group_rank`, and catalog equivalents), the index of its output
    /// (rank-receiving) argument. The Chi that argument's pointee produces
    /// is a taint source: every value read back from it is rank-dependent
    /// by construction. `None` for ordinary functions.
    fn rank_query_out_arg(&self, f: FuncId) -> Option<usize>;
}
