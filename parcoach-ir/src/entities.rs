//! Opaque references to the pieces of an IR module.
//!
//! Instructions in the IR refer to other parts of the module (blocks,
//! other instructions, functions). These references are never Rust
//! references: they are 32-bit indices into an arena owned by the
//! `Function` or `Module`, following the entity-reference idiom laid out
//! in `parcoach-entity`. A separate newtype per entity kind means a
//! `Value` can never be accidentally indexed into the `Block` arena.

use parcoach_entity::entity_impl;
use std::fmt;

/// A reference to a top-level SSA value: a register, constant, instruction
/// result, global, or function argument.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to a function within a `Module`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId, "fn");

/// An allocation site as reported by the pointer-to analysis: the `Value`
/// that produced the allocated memory (a stack slot, a global, or the
/// result of a heap-allocating call).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocSite(Value);

impl AllocSite {
    /// Wrap the `Value` that represents this allocation site.
    pub fn new(v: Value) -> Self {
        Self(v)
    }

    /// The underlying `Value`.
    pub fn value(self) -> Value {
        self.0
    }
}

impl fmt::Display for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "alloc({})", self.0)
    }
}

impl fmt::Debug for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        (self as &dyn fmt::Display).fmt(f)
    }
}

/// Either a statically resolved callee or an indirect call awaiting
/// resolution from the external `CallGraph` collaborator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A direct call to a known function.
    Direct(FuncId),
    /// An indirect call through a function-pointer value; `callees()` on
    /// the `CallGraph` collaborator resolves the possible targets.
    Indirect(Value),
}

/// A source location attached to an instruction for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct SourceLoc {
    /// Source file path as reported by the IR's debug info.
    pub file: std::rc::Rc<str>,
    /// 1-based source line.
    pub line: u32,
}

impl SourceLoc {
    /// Build a new source location.
    pub fn new(file: impl Into<std::rc::Rc<str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
