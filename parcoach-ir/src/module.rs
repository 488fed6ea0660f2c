//! A module: the collection of functions the analysis runs over.

use crate::entities::FuncId;
use crate::function::Function;
use parcoach_entity::PrimaryMap;
use std::collections::HashMap;

/// A whole compilation unit: every function, indexed both by `FuncId` and
/// by name.
#[derive(Clone, Default)]
pub struct Module {
    functions: PrimaryMap<FuncId, Function>,
    by_name: HashMap<String, FuncId>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `func` to the module, returning its id.
    ///
    /// # Panics
    ///
    /// Panics if a function with the same name was already declared; a
    /// module built from a single translation unit's IR should never
    /// produce a duplicate.
    pub fn declare_function(&mut self, func: Function) -> FuncId {
        let name = func.name.clone();
        let id = self.functions.push(func);
        if self.by_name.insert(name.clone(), id).is_some() {
            panic!("duplicate function name: {name}");
        }
        id
    }

    /// Look up a function by id.
    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    /// Look up a function by id, mutably.
    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id]
    }

    /// Resolve a function name to its id.
    pub fn func_id_by_name(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    /// Iterate over every function id in the module.
    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions.keys()
    }

    /// Number of functions declared in the module.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the module declares no functions.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
