//! A small append-only IR builder for tests and fixtures.
//!
//! There is no textual IR format to parse in this crate: test cases
//! build `Function`s directly. The builder follows the cursor style of a
//! SSA-construction frontend — `create_block`/`switch_to_block` position
//! a cursor, and each `ins_*` method appends one instruction at the
//! cursor and returns its result value, if it has one.

use crate::entities::{Block, Callee, FuncId, Value};
use crate::function::Function;
use crate::instructions::{BinOp, CmpOp, InstructionData};

/// Builds a single `Function` one instruction at a time.
pub struct FunctionBuilder {
    func: Function,
    current: Option<Block>,
}

impl FunctionBuilder {
    /// Start building a function named `name` with no blocks yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            func: Function::new(name),
            current: None,
        }
    }

    /// Create a new block, not yet positioned at.
    pub fn create_block(&mut self) -> Block {
        let block = self.func.dfg.make_block_placeholder();
        self.func.layout.append_block(block);
        block
    }

    /// Append a formal parameter to `block`.
    pub fn append_block_param(&mut self, block: Block) -> Value {
        self.func.dfg.append_block_param(block)
    }

    /// Position the cursor at the end of `block`'s instruction list.
    pub fn switch_to_block(&mut self, block: Block) {
        self.current = Some(block);
    }

    fn emit(&mut self, data: InstructionData) -> crate::entities::Inst {
        let block = self.current.expect("no block selected");
        let inst = self.func.dfg.make_inst(data);
        self.func.layout.append_inst(block, inst);
        inst
    }

    fn emit_with_result(&mut self, data: InstructionData) -> Value {
        let block = self.current.expect("no block selected");
        let (inst, value) = self.func.dfg.make_inst_with_result(data);
        self.func.layout.append_inst(block, inst);
        value
    }

    /// `dst = value` (an integer constant).
    pub fn ins_const(&mut self, value: i64) -> Value {
        self.emit_with_result(InstructionData::Const { value })
    }

    /// `dst = lhs op rhs`.
    pub fn ins_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        self.emit_with_result(InstructionData::Binary {
            op,
            args: [lhs, rhs],
        })
    }

    /// `dst = lhs cmp rhs`.
    pub fn ins_cmp(&mut self, op: CmpOp, lhs: Value, rhs: Value) -> Value {
        self.emit_with_result(InstructionData::Cmp {
            op,
            args: [lhs, rhs],
        })
    }

    /// `dst = *ptr`.
    pub fn ins_load(&mut self, ptr: Value) -> Value {
        self.emit_with_result(InstructionData::Load { ptr })
    }

    /// `*ptr = value`.
    pub fn ins_store(&mut self, ptr: Value, value: Value) {
        self.emit(InstructionData::Store { ptr, value });
    }

    /// A direct call with a result value.
    pub fn ins_call(&mut self, callee: FuncId, args: Vec<Value>) -> Value {
        self.emit_with_result(InstructionData::Call {
            callee: Callee::Direct(callee),
            args,
            result: None,
        })
    }

    /// A direct call with no result value (a void callee).
    pub fn ins_call_void(&mut self, callee: FuncId, args: Vec<Value>) {
        self.emit(InstructionData::Call {
            callee: Callee::Direct(callee),
            args,
            result: None,
        });
    }

    /// An unconditional jump, terminating the current block.
    pub fn ins_jump(&mut self, target: Block) {
        self.emit(InstructionData::Jump { target });
    }

    /// A conditional branch, terminating the current block.
    pub fn ins_branch(&mut self, cond: Value, then_block: Block, else_block: Block) {
        self.emit(InstructionData::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    /// A return, terminating the current block.
    pub fn ins_return(&mut self, values: Vec<Value>) {
        self.emit(InstructionData::Return { values });
    }

    /// Finish building and take ownership of the function.
    pub fn finish(self) -> Function {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_function_with_a_result() {
        let mut b = FunctionBuilder::new("add_one");
        let entry = b.create_block();
        let x = b.append_block_param(entry);
        b.switch_to_block(entry);
        let one = b.ins_const(1);
        let sum = b.ins_binary(BinOp::Add, x, one);
        b.ins_return(vec![sum]);

        let func = b.finish();
        assert_eq!(func.params(), &[x]);
        assert_eq!(func.layout.block_insts(entry).len(), 3);
    }
}
