//! ofmetrics analyzer
//!
//! Reads a persisted metrics document and prints the performance report.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use ofmetrics_analyzer::distribution::{DEFAULT_BINS, MAX_BINS};
use ofmetrics_analyzer::report::distributions;
use ofmetrics_analyzer::{analyze, load_document};
use ofmetrics_controller::logging::init_logging;

#[derive(Parser)]
#[command(name = "ofmetrics-analyzer")]
#[command(about = "Offline latency, throughput and overhead report for controller metrics", long_about = None)]
struct Cli {
    /// Metrics document written by the controller on shutdown
    #[arg(short, long, value_name = "FILE", default_value = "./data/tcp_baseline_metrics.json")]
    input: PathBuf,

    /// Also write the report to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Export histogram and CDF data as JSON
    #[arg(long, value_name = "FILE")]
    distribution: Option<PathBuf>,

    /// Histogram bin count
    #[arg(long, default_value_t = DEFAULT_BINS as u64, value_parser = clap::value_parser!(u64).range(1..=MAX_BINS as u64))]
    bins: u64,
}

fn main() -> Result<()> {
    init_logging().context("Failed to initialize logging")?;
    let cli = Cli::parse();

    let document = load_document(&cli.input)?;
    let report = analyze(&document).render();
    println!("{report}");

    if let Some(path) = &cli.output {
        std::fs::write(path, &report).with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report saved to {}", path.display());
    }

    if let Some(path) = &cli.distribution {
        let data = distributions(&document, cli.bins as usize);
        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write distribution data to {}", path.display()))?;
        info!("Distribution data for {} categories saved to {}", data.len(), path.display());
    }
    Ok(())
}
