//! The data flow graph: owns every `Value` and `Inst` in a function and
//! records which instruction (or block parameter) defines each value.

use crate::entities::{Block, Inst, Value};
use crate::instructions::InstructionData;
use parcoach_entity::{PrimaryMap, SecondaryMap};

/// What defines a `Value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueDef {
    /// The result of an instruction.
    Result(Inst),
    /// A block parameter (the entry block's parameters are the function's
    /// formal arguments).
    Param(Block, usize),
}

/// Owns the instructions, values, block parameter lists, and block
/// identities of a function.
#[derive(Clone, Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<Inst, InstructionData>,
    results: SecondaryMap<Inst, Option<Value>>,
    value_defs: PrimaryMap<Value, ValueDef>,
    block_params: SecondaryMap<Block, Vec<Value>>,
    blocks: PrimaryMap<Block, ()>,
}

impl DataFlowGraph {
    /// Create an empty data flow graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh block identity. Building blocks is the data flow
    /// graph's job; ordering them is `Layout`'s (see `builder::create_block`,
    /// which does both).
    pub fn make_block_placeholder(&mut self) -> Block {
        self.blocks.push(())
    }

    /// Append a new instruction with no result value.
    pub fn make_inst(&mut self, data: InstructionData) -> Inst {
        self.insts.push(data)
    }

    /// Append a new instruction and attach a freshly minted result value.
    pub fn make_inst_with_result(&mut self, data: InstructionData) -> (Inst, Value) {
        let inst = self.insts.push(data);
        let value = self.value_defs.push(ValueDef::Result(inst));
        self.results[inst] = Some(value);
        (inst, value)
    }

    /// Append a new formal parameter to `block`, returning its `Value`.
    pub fn append_block_param(&mut self, block: Block) -> Value {
        let index = self.block_params[block].len();
        let value = self.value_defs.push(ValueDef::Param(block, index));
        self.block_params[block].push(value);
        value
    }

    /// Data for an instruction.
    pub fn inst(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    /// Mutable data for an instruction.
    pub fn inst_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    /// The result value of `inst`, if it has one.
    pub fn inst_result(&self, inst: Inst) -> Option<Value> {
        self.results[inst]
    }

    /// What defines `value`.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.value_defs[value]
    }

    /// Formal parameters of `block`, in order.
    pub fn block_params(&self, block: Block) -> &[Value] {
        &self.block_params[block]
    }

    /// Iterate over every instruction in the function, in arbitrary
    /// (insertion) order. Use `Layout` to iterate in program order.
    pub fn all_insts(&self) -> impl Iterator<Item = Inst> + '_ {
        self.insts.keys()
    }

    /// Iterate over every value ever defined in the function.
    pub fn all_values(&self) -> impl Iterator<Item = Value> + '_ {
        self.value_defs.keys()
    }
}
