//! IR model and external-collaborator trait seams consumed by the
//! collective-divergence analyzer.
//!
//! This crate defines a minimal SSA-form IR (functions, blocks,
//! instructions, values) and the trait boundaries (`PointsToAnalysis`,
//! `DominanceInfo`, `CallGraph`, `ModRefOracle`, `CollectiveTable`) that
//! the analysis passes in `parcoach-core` program against. It does not
//! implement any of those services itself, and it does not know about
//! memory regions, Mu/Chi annotations, or the dependency graph — those
//! are `parcoach-core`'s types, built on top of what's defined here.

pub mod builder;
pub mod cfg;
pub mod dfg;
pub mod entities;
pub mod function;
pub mod instructions;
pub mod layout;
pub mod module;
pub mod traits;

pub use cfg::ControlFlowGraph;
pub use dfg::{DataFlowGraph, ValueDef};
pub use entities::{AllocSite, Block, Callee, FuncId, Inst, SourceLoc, Value};
pub use function::Function;
pub use instructions::{BinOp, CmpOp, InstructionData};
pub use layout::Layout;
pub use module::Module;
pub use traits::{
    CallGraph as CallGraphTrait, CollectiveColor, CollectiveTable, DominanceInfo, ModRefOracle,
    PointsToAnalysis, Region,
};
