//! Differential run of the in-memory oracle against a second catalog.

use anyhow::{Context, Result};
use catalog_fuzz::{MemoryCatalog, RunConfig, Runner};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "catalog-fuzz")]
#[command(about = "Run random schema workloads against two catalogs and compare their states")]
struct Args {
    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of commands to generate
    #[arg(short, long)]
    iterations: Option<usize>,

    /// JSON run configuration (weights, retry budget, iterations)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON, also when the run fails
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the replayable command transcript as JSON
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Translate each command to DDL and log it
    #[arg(long)]
    statements: bool,

    /// Enable debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let mut config = match &args.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(iterations) = args.iterations {
        config = config.with_iterations(iterations);
    }
    if args.statements {
        config = config.with_statements(true);
    }

    let oracle = MemoryCatalog::new("oracle")?;
    let sut = MemoryCatalog::new("sut")?;
    let mut runner = Runner::new(config, oracle, sut)?;
    let outcome = runner.advance();
    if let Some(path) = &args.transcript {
        runner
            .transcript()
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "transcript written");
    }
    let report = runner.finish();

    for (kind, count) in &report.kind_counts {
        info!(%kind, count, "commands");
    }
    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if let Err(err) = outcome {
        error!(seed = report.seed, steps = report.steps.len(), "divergence found");
        return Err(err.into());
    }
    info!(
        seed = report.seed,
        steps = report.steps.len(),
        "no divergence found"
    );
    Ok(())
}
