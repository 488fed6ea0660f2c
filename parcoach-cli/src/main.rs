//! Command-line entry point: reads a module, builds this crate's own
//! naive collaborators, runs `parcoach_core::Driver`, and renders the
//! report. The pipeline assembly itself lives in `lib.rs`, so integration
//! tests can call it directly.

use anyhow::{Context, Result};
use clap::Parser;
use parcoach_cli::report;
use parcoach_core::config::{CollectiveTables, Config, DumpOptions, OutputOptions, ReportFormat, UpdateMode};
use std::path::PathBuf;

/// Static detection of potentially-deadlocking MPI/OpenMP/UPC/CUDA
/// collective calls.
#[derive(Parser, Debug)]
#[command(name = "parcoach", version, about)]
struct Cli {
    /// Input IR file to analyze.
    input: PathBuf,

    /// Enable the MPI collective catalog.
    #[arg(long)]
    check_mpi: bool,
    /// Enable the OpenMP collective catalog.
    #[arg(long)]
    check_omp: bool,
    /// Enable the UPC collective catalog.
    #[arg(long)]
    check_upc: bool,
    /// Enable the CUDA collective catalog.
    #[arg(long)]
    check_cuda: bool,

    /// Skip phi-elimination.
    #[arg(long)]
    disable_phi_elim: bool,
    /// Thread context sensitivity through the pipeline (taint propagation
    /// still runs context-insensitively; see DESIGN.md).
    #[arg(long)]
    context_sensitive: bool,
    /// Omit the pointer-operand dependency edge from loads/stores.
    #[arg(long)]
    no_ptr_dep: bool,
    /// Omit predicate-to-phi control edges.
    #[arg(long)]
    no_phi_pred: bool,
    /// Skip taint propagation; every controlling predicate is treated as
    /// tainted.
    #[arg(long)]
    no_dataflow: bool,
    /// Collect and print per-phase wall-clock timings.
    #[arg(long)]
    timer: bool,
    /// Use strong updates through singleton points-to sets (default:
    /// weak/merging updates).
    #[arg(long)]
    strong_update: bool,

    /// Print memory-SSA for every function.
    #[arg(long)]
    dump_ssa: bool,
    /// Print memory-SSA for one function only.
    #[arg(long, value_name = "NAME")]
    dump_ssa_func: Option<String>,
    /// Print the region table.
    #[arg(long)]
    dump_regions: bool,
    /// Compute human-readable region names for `--dump-regions`.
    #[arg(long)]
    with_reg_name: bool,
    /// Print per-function mod/ref summaries.
    #[arg(long)]
    dump_modref: bool,
    /// Print IR and analysis-result counters, then exit before running
    /// the checker.
    #[arg(long)]
    statistics: bool,

    /// Write the dependency graph to `dg.dot`.
    #[arg(long)]
    dot_depgraph: bool,
    /// Write one `taintedpath-<file>-<line>.dot` per warning.
    #[arg(long)]
    dot_taint_paths: bool,
    /// Analyze only; skip the instrumentation placement plan.
    #[arg(long)]
    no_instrumentation: bool,
    /// Report rendering.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Increase logging verbosity (may be repeated).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Suppress all logging below warnings.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = build_config(&cli);

    let src = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let (analysis_report, timing) = parcoach_cli::analyze(&src, &config)?;

    if config.dump.statistics {
        report::print_statistics(&analysis_report.stats);
        return Ok(());
    }

    match config.output.format {
        ReportFormat::Text => report::print_text(&analysis_report),
        ReportFormat::Json => report::print_json(&analysis_report)?,
    }

    if let Some(timing) = timing {
        report::print_timing(&timing);
    }

    if !analysis_report.warnings.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        log::LevelFilter::Warn
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn build_config(cli: &Cli) -> Config {
    Config {
        disable_phi_elim: cli.disable_phi_elim,
        context_sensitive: cli.context_sensitive,
        no_ptr_dep: cli.no_ptr_dep,
        no_phi_pred: cli.no_phi_pred,
        no_dataflow: cli.no_dataflow,
        timer: cli.timer,
        update_mode: if cli.strong_update { UpdateMode::Strong } else { UpdateMode::Weak },
        collectives: CollectiveTables {
            mpi: cli.check_mpi,
            omp: cli.check_omp,
            upc: cli.check_upc,
            cuda: cli.check_cuda,
        },
        dump: DumpOptions {
            dump_ssa: cli.dump_ssa,
            dump_ssa_func: cli.dump_ssa_func.clone(),
            dump_regions: cli.dump_regions,
            with_reg_name: cli.with_reg_name,
            dump_modref: cli.dump_modref,
            statistics: cli.statistics,
        },
        output: OutputOptions {
            dot_depgraph: cli.dot_depgraph,
            dot_taint_paths: cli.dot_taint_paths,
            no_instrumentation: cli.no_instrumentation,
            format: match cli.format {
                Format::Text => ReportFormat::Text,
                Format::Json => ReportFormat::Json,
            },
        },
    }
}
