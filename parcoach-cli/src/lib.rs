//! Library surface behind the `parcoach` binary: the naive collaborator
//! implementations, the textual-IR frontend, and report rendering. Split
//! out of `main.rs` so integration tests can drive the real pipeline —
//! the same `NaiveModRef`/`NaiveCallGraph`/`frontend` assembly `main`
//! uses — without spawning a subprocess.

pub mod analyses;
pub mod frontend;
pub mod report;

use analyses::{NaiveCallGraph, NaiveCollectiveTable, NaiveDominance, NaiveModRef, NaivePointsTo};
use parcoach_core::{AnalysisReport, Collaborators, Config, Driver, TimingReport};
use parcoach_ir::{ControlFlowGraph, DominanceInfo, FuncId, PointsToAnalysis};
use std::collections::HashMap;

/// Parse `src` and run the full analysis pipeline with this crate's own
/// naive collaborators, the same assembly the `parcoach` binary performs.
pub fn analyze(
    src: &str,
    config: &Config,
) -> anyhow::Result<(AnalysisReport, Option<TimingReport>)> {
    let module = frontend::parse_module(src)?;

    let points_to = NaivePointsTo::build(&module);
    let call_graph = NaiveCallGraph::build(&module);
    let collectives = NaiveCollectiveTable::build(&module);
    let region_table = parcoach_core::RegionTable::build(points_to.all_allocation_sites());
    let modref = NaiveModRef::build(&module, &region_table, &points_to, &call_graph);

    let mut dominance: HashMap<FuncId, Box<dyn DominanceInfo>> = HashMap::new();
    for f in module.func_ids() {
        let func = module.func(f);
        if func.is_declaration() {
            continue;
        }
        let cfg = ControlFlowGraph::compute(func);
        dominance.insert(f, Box::new(NaiveDominance::new(func, &cfg)));
    }

    let collaborators = Collaborators {
        points_to: &points_to,
        call_graph: &call_graph,
        modref: &modref,
        collectives: &collectives,
        dominance: &dominance,
    };

    let driver = Driver::new(&module, config, collaborators)?;
    Ok(driver.run()?)
}
