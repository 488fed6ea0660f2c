//! Rendering the analysis report as text or JSON, and the `--timer`
//! phase breakdown.

use anyhow::Result;
use parcoach_core::TimingReport;
use parcoach_core::{AnalysisReport, Stats};

pub fn print_text(report: &AnalysisReport) {
    if report.warnings.is_empty() {
        println!("parcoach: no potential collective divergence found");
        return;
    }
    for warning in &report.warnings {
        let loc = match (&warning.file, warning.line) {
            (Some(file), Some(line)) => format!("{file}:{line}"),
            _ => "<no debug info>".to_string(),
        };
        println!("warning: {loc}: {}", warning.message);
        for controlling in &warning.controlling_locations {
            println!("  controlled by: {controlling}");
        }
    }
    println!(
        "parcoach: {} warning{} found",
        report.warnings.len(),
        if report.warnings.len() == 1 { "" } else { "s" }
    );
}

pub fn print_json(report: &AnalysisReport) -> Result<()> {
    let warnings: Vec<serde_json::Value> = report
        .warnings
        .iter()
        .map(|w| {
            serde_json::json!({
                "file": w.file.as_deref(),
                "line": w.line,
                "collective": w.collective_name,
                "controlling_locations": w.controlling_locations,
                "message": w.message,
            })
        })
        .collect();
    let value = serde_json::json!({
        "warnings": warnings,
        "stats": stats_json(&report.stats),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub fn print_statistics(stats: &Stats) {
    println!("{}", serde_json::to_string_pretty(&stats_json(stats)).expect("stats serialize"));
}

fn stats_json(stats: &Stats) -> serde_json::Value {
    serde_json::json!({
        "functions": stats.functions,
        "regions": stats.regions,
        "mu_count": stats.mu_count,
        "chi_count": stats.chi_count,
        "mem_vars": stats.mem_vars,
        "dg_nodes": stats.dg_nodes,
        "dg_edges": stats.dg_edges,
        "warnings": stats.warnings,
        "recoverable_errors": stats.recoverable_errors,
    })
}

pub fn print_timing(timing: &TimingReport) {
    println!("phase timings:");
    for (phase, duration) in timing.phases() {
        println!("  {phase:<12} {:>10.3?}", duration);
    }
}
