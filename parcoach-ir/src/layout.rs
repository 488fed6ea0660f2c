//! Function layout: the order of blocks in a function and of instructions
//! within a block.
//!
//! `DataFlowGraph` owns instruction and value *definitions*; `Layout` owns
//! their *order*. Control dependence (and therefore the dominator tree,
//! the post-dominator tree, and every downstream pass) depends on this
//! order, even though no data dependency does.
//!
//! Unlike a JIT's IR layout, this analyzer never splices or reorders
//! instructions after a module is built, so a doubly linked list per block
//! would only add indirection; blocks and instructions are appended once
//! and the layout is read back in that same order.

use crate::entities::{Block, Inst};
use parcoach_entity::SecondaryMap;

/// The order of blocks and instructions in a function.
#[derive(Clone, Default)]
pub struct Layout {
    block_order: Vec<Block>,
    block_insts: SecondaryMap<Block, Vec<Inst>>,
    inst_block: SecondaryMap<Inst, Option<Block>>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `block` to the end of the function.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(
            !self.block_order.contains(&block),
            "block already present in layout"
        );
        self.block_order.push(block);
    }

    /// Append `inst` to the end of `block`.
    pub fn append_inst(&mut self, block: Block, inst: Inst) {
        self.block_insts[block].push(inst);
        self.inst_block[inst] = Some(block);
    }

    /// Blocks in program order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    /// The entry block, if any block has been laid out.
    pub fn entry_block(&self) -> Option<Block> {
        self.block_order.first().copied()
    }

    /// Instructions of `block`, in program order.
    pub fn block_insts(&self, block: Block) -> &[Inst] {
        &self.block_insts[block]
    }

    /// The block containing `inst`, if it has been laid out.
    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.inst_block[inst]
    }

    /// The terminator instruction of `block` (its last instruction), if
    /// the block is non-empty.
    pub fn terminator(&self, block: Block) -> Option<Inst> {
        self.block_insts[block].last().copied()
    }

    /// Number of blocks laid out.
    pub fn num_blocks(&self) -> usize {
        self.block_order.len()
    }
}
