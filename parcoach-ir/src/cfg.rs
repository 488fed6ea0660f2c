//! A control flow graph of a function's blocks, computed from the layout
//! and terminator instructions.
//!
//! Building the CFG itself is this crate's job (collaborators only push dominance,
//! post-dominance, and loop detection out to an external collaborator);
//! those collaborators are themselves usually implemented on top of a CFG
//! like this one.

use crate::entities::{Block, Inst};
use crate::function::Function;
use parcoach_entity::SecondaryMap;

#[derive(Clone, Default)]
struct CfgNode {
    predecessors: Vec<(Block, Inst)>,
    successors: Vec<Block>,
}

/// Predecessors and successors of every block in a function.
#[derive(Clone, Default)]
pub struct ControlFlowGraph {
    nodes: SecondaryMap<Block, CfgNode>,
}

impl ControlFlowGraph {
    /// Compute the control flow graph of `func`.
    pub fn compute(func: &Function) -> Self {
        let mut cfg = Self::default();
        for block in func.layout.blocks() {
            if let Some(term) = func.layout.terminator(block) {
                for succ in func.dfg.inst(term).successors() {
                    cfg.nodes[block].successors.push(succ);
                    cfg.nodes[succ].predecessors.push((block, term));
                }
            }
        }
        cfg
    }

    /// Successor blocks of `block`, in terminator operand order.
    pub fn succs(&self, block: Block) -> &[Block] {
        &self.nodes[block].successors
    }

    /// `(predecessor, branch instruction)` pairs for `block`.
    pub fn preds(&self, block: Block) -> &[(Block, Inst)] {
        &self.nodes[block].predecessors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::instructions::CmpOp;

    #[test]
    fn straight_line_has_no_branches() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        b.switch_to_block(entry);
        b.ins_return(vec![]);
        let func = b.finish();

        let cfg = ControlFlowGraph::compute(&func);
        assert!(cfg.succs(entry).is_empty());
        assert!(cfg.preds(entry).is_empty());
    }

    #[test]
    fn branch_creates_two_successors() {
        let mut b = FunctionBuilder::new("f");
        let entry = b.create_block();
        let then_blk = b.create_block();
        let else_blk = b.create_block();
        let join = b.create_block();

        b.switch_to_block(entry);
        let c = b.ins_const(0);
        let cond = b.ins_cmp(CmpOp::Ne, c, c);
        b.ins_branch(cond, then_blk, else_blk);

        b.switch_to_block(then_blk);
        b.ins_jump(join);

        b.switch_to_block(else_blk);
        b.ins_jump(join);

        b.switch_to_block(join);
        b.ins_return(vec![]);

        let func = b.finish();
        let cfg = ControlFlowGraph::compute(&func);

        assert_eq!(cfg.succs(entry), &[then_blk, else_blk]);
        assert_eq!(cfg.preds(join).len(), 2);
    }
}
