//! Taint propagation: flood-fill from rank-query sources, then a
//! second pass deriving which call sites are executed under a tainted
//! condition.

use crate::depgraph::{DepGraph, Node};
use parcoach_ir::FuncId;
use std::collections::{BTreeSet, VecDeque};

/// The result of a taint propagation pass: which nodes are tainted, and
/// which call sites are reached under a tainted controlling predicate.
#[derive(Clone, Default)]
pub struct TaintResult {
    tainted: BTreeSet<Node>,
    tainted_calls: BTreeSet<Node>,
}

impl TaintResult {
    /// Whether `node` carries rank-dependent data.
    pub fn is_tainted(&self, node: Node) -> bool {
        self.tainted.contains(&node)
    }

    /// Whether `call` executes under a tainted controlling predicate,
    /// directly or because a tainted caller reaches it transitively.
    pub fn is_call_tainted(&self, call: Node) -> bool {
        self.tainted_calls.contains(&call)
    }

    /// Every tainted node.
    pub fn tainted(&self) -> impl Iterator<Item = Node> + '_ {
        self.tainted.iter().copied()
    }
}

/// Flood-fill taint forward from the graph's marked sources, then derive
/// `tainted_calls` from the controlling-predicate edges the dependency graph
/// already wired. `--no-dataflow` skips this entirely; callers that pass
/// that flag should treat every predicate as tainted instead of calling
/// this function instead.
pub fn propagate(graph: &DepGraph) -> TaintResult {
    let mut tainted: BTreeSet<Node> = graph.taint_sources().collect();
    let mut worklist: VecDeque<Node> = tainted.iter().copied().collect();
    while let Some(node) = worklist.pop_front() {
        for child in graph.children_of(node) {
            if tainted.insert(child) {
                worklist.push_back(child);
            }
        }
    }

    let mut tainted_calls: BTreeSet<Node> = BTreeSet::new();
    let mut call_worklist: VecDeque<Node> = VecDeque::new();
    for call in graph.call_nodes() {
        let controlled = graph
            .parents_of(call)
            .any(|p| matches!(p, Node::Value(..)) && tainted.contains(&p));
        if controlled && tainted_calls.insert(call) {
            call_worklist.push_back(call);
        }
    }
    while let Some(call) = call_worklist.pop_front() {
        let callees: Vec<FuncId> = graph.callees_of(call).collect();
        for callee in callees {
            for inner in graph.call_nodes_of(callee) {
                if tainted_calls.insert(inner) {
                    call_worklist.push_back(inner);
                }
            }
        }
    }

    TaintResult {
        tainted,
        tainted_calls,
    }
}
