//! A single function: its signature plus the data flow graph and layout
//! that hold its body.

use crate::dfg::DataFlowGraph;
use crate::entities::{Inst, SourceLoc};
use crate::layout::Layout;
use parcoach_entity::SecondaryMap;

/// A function in a module.
///
/// A function with no blocks laid out (`is_declaration() == true`) models
/// an external function: a library call, an MPI/OpenMP/UPC/CUDA runtime
/// entry point, or any other callee whose body is not part of the module
/// under analysis. Its mod/ref facts come from `pointer_params` at each
/// call site instead of from load/store operands it has none of; memory-SSA
/// construction then synthesizes an entry Chi per touched region and an
/// exit Chi per modified region for it, the same as it would collect from
/// a body's `Return` instructions.
#[derive(Clone)]
pub struct Function {
    /// The function's name, as it appears in diagnostics and DOT output.
    pub name: String,
    /// Data flow graph: owns every instruction and value.
    pub dfg: DataFlowGraph,
    /// Block and instruction order.
    pub layout: Layout,
    /// Whether each formal parameter is pointer-typed (vs. a scalar),
    /// indexed the same way as the entry block's parameters. Used to
    /// synthesize Mu/Chi annotations for declarations with no body.
    pub pointer_params: Vec<bool>,
    /// Whether the function accepts a variable number of arguments.
    pub is_variadic: bool,
    /// Source locations for instructions that have debug info attached.
    pub debug_locs: SecondaryMap<Inst, Option<SourceLoc>>,
}

impl Function {
    /// Create a new, empty function with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
            pointer_params: Vec::new(),
            is_variadic: false,
            debug_locs: SecondaryMap::new(),
        }
    }

    /// A function with no blocks laid out is a declaration: its body is
    /// not part of the module under analysis.
    pub fn is_declaration(&self) -> bool {
        self.layout.entry_block().is_none()
    }

    /// The function's entry block, if it has a body.
    pub fn entry_block(&self) -> Option<crate::entities::Block> {
        self.layout.entry_block()
    }

    /// The formal parameters of the function, in declaration order. Empty
    /// for a declaration with no entry block.
    pub fn params(&self) -> &[crate::entities::Value] {
        match self.entry_block() {
            Some(block) => self.dfg.block_params(block),
            None => &[],
        }
    }

    /// Attach a source location to an instruction.
    pub fn set_debug_loc(&mut self, inst: Inst, loc: SourceLoc) {
        self.debug_locs[inst] = Some(loc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_function_is_a_declaration() {
        let f = Function::new("foo");
        assert!(f.is_declaration());
        assert!(f.params().is_empty());
    }
}
