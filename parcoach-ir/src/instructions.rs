//! A tagged-union instruction model.
//!
//! `DepGraph` construction dispatches on instruction
//! kind to decide which edges to add. A tagged union with a single `match`
//! at the dispatch site is far easier to test exhaustively than a visitor
//! hierarchy: every arm of `InstructionData` corresponds to exactly one row
//! of the edge-construction table.

use crate::entities::{Block, Callee, Value};

/// A binary operator. The dependency graph treats every variant the same
/// way (each operand flows to the result), so no further refinement is
/// modeled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// A comparison predicate. Distinguished from `BinOp` only because
/// comparisons are the typical producers of branch conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The payload of a single instruction.
///
/// `Load`, `Store`, and `Call` are the only variants that touch memory.
/// Their Mu (read) and Chi (write) annotations are not stored inline here;
/// they live in a side table keyed by `Inst`, owned by whichever crate
/// builds the memory SSA (see `parcoach-core::mssa`), so that this crate
/// never has to know that type exists.
#[derive(Clone, Debug)]
pub enum InstructionData {
    /// An integer or pointer constant.
    Const { value: i64 },

    /// `dst = lhs op rhs`.
    Binary { op: BinOp, args: [Value; 2] },

    /// `dst = lhs cmp rhs`, typically feeding a branch condition.
    Cmp { op: CmpOp, args: [Value; 2] },

    /// A cast / bitcast / truncation / extension; the single operand flows
    /// unchanged to the result for dependency purposes.
    Cast { arg: Value },

    /// `dst = cond ? a : b`.
    Select { cond: Value, a: Value, b: Value },

    /// Pointer arithmetic: `dst = base + offset-contributing operands`.
    /// All operands (including `base`) flow to `dst`.
    Gep { base: Value, indices: Vec<Value> },

    /// Extraction from / insertion into an aggregate value. `inserted` is
    /// `None` for extraction.
    ExtractInsert {
        aggregate: Value,
        inserted: Option<Value>,
    },

    /// A top-level SSA value phi: merges one value per predecessor edge.
    ValuePhi { incoming: Vec<(Block, Value)> },

    /// `dst = *ptr`. The regions this load reads (and thus the Mu
    /// annotations attached to it) are derived during memory-SSA construction and kept in
    /// a side table keyed by `Inst`, not inline here — see
    /// `parcoach-core::mssa`.
    Load { ptr: Value },

    /// `*ptr = value`. The Chi annotations this store produces live in the
    /// same side table as `Load`'s Mu set.
    Store { ptr: Value, value: Value },

    /// A call site. `result` is `None` for void callees. The Mu/Chi sets
    /// for the regions the callee reads/writes are attached during
    /// memory-SSA construction in the same side table; a declared callee
    /// with no body gets a synthesized exit version per modified region
    /// there too, so a caller's Chi still has something to chain off of.
    Call {
        callee: Callee,
        args: Vec<Value>,
        result: Option<Value>,
    },

    /// An unconditional jump.
    Jump { target: Block },

    /// A conditional branch; `then_block` is taken when `cond` is
    /// non-zero.
    Branch {
        cond: Value,
        then_block: Block,
        else_block: Block,
    },

    /// A function return.
    Return { values: Vec<Value> },
}

impl InstructionData {
    /// Is this instruction a block terminator?
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstructionData::Jump { .. }
                | InstructionData::Branch { .. }
                | InstructionData::Return { .. }
        )
    }

    /// Is this instruction a call site?
    pub fn is_call(&self) -> bool {
        matches!(self, InstructionData::Call { .. })
    }

    /// The top-level `Value` operands read by this instruction, in order.
    /// Does not include memory operands (those live on `mu`/`chi`).
    pub fn value_args(&self) -> Vec<Value> {
        match self {
            InstructionData::Const { .. } => vec![],
            InstructionData::Binary { args, .. } => args.to_vec(),
            InstructionData::Cmp { args, .. } => args.to_vec(),
            InstructionData::Cast { arg } => vec![*arg],
            InstructionData::Select { cond, a, b } => vec![*cond, *a, *b],
            InstructionData::Gep { base, indices } => {
                let mut v = vec![*base];
                v.extend(indices.iter().copied());
                v
            }
            InstructionData::ExtractInsert {
                aggregate,
                inserted,
            } => {
                let mut v = vec![*aggregate];
                v.extend(*inserted);
                v
            }
            InstructionData::ValuePhi { incoming } => {
                incoming.iter().map(|(_, v)| *v).collect()
            }
            InstructionData::Load { ptr } => vec![*ptr],
            InstructionData::Store { ptr, value } => vec![*ptr, *value],
            InstructionData::Call { args, .. } => args.clone(),
            InstructionData::Jump { .. } => vec![],
            InstructionData::Branch { cond, .. } => vec![*cond],
            InstructionData::Return { values } => values.clone(),
        }
    }

    /// The successor blocks of a terminator, in layout order.
    pub fn successors(&self) -> Vec<Block> {
        match self {
            InstructionData::Jump { target } => vec![*target],
            InstructionData::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            InstructionData::Return { .. } => vec![],
            _ => vec![],
        }
    }
}
