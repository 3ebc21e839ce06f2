//! Market-Data Normalization Driver
//!
//! Loads one raw CSV batch, runs exactly one table transform over it and
//! writes the canonical result.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use table_normalizer::{Normalized, NormalizerConfig, TableNormalizer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod csv_io;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "NORMALIZER";

/// Which raw table a batch holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableKind {
    /// Option minute/day aggregates
    Option,
    /// Stock minute/day aggregates
    Stock,
    /// Daily treasury yield curves
    Treasury,
}

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "normalize", version, about = "Normalize a raw market-data CSV batch")]
pub struct Args {
    /// Transform to run
    #[arg(value_enum)]
    pub kind: TableKind,

    /// Raw input CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// Normalized output CSV
    #[arg(short, long)]
    pub output: PathBuf,

    /// Config file (TOML, JSON or YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the transform report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Initialize logging
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Load configuration from an optional file, then `NORMALIZER_*` variables
pub fn load_config(path: Option<&Path>) -> Result<NormalizerConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .context("loading normalizer configuration")?;

    settings
        .try_deserialize()
        .context("parsing normalizer configuration")
}

/// Run one transform over an in-memory batch
pub fn normalize(
    normalizer: &TableNormalizer,
    kind: TableKind,
    table: &DataFrame,
) -> Result<Normalized> {
    let normalized = match kind {
        TableKind::Option => normalizer.option_aggregates(table),
        TableKind::Stock => normalizer.stock_aggregates(table),
        TableKind::Treasury => normalizer.treasury_yields(table),
    }?;
    Ok(normalized)
}

/// Load, normalize and write one batch
pub fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    info!("Using config: {:?}", config);
    let normalizer = TableNormalizer::new(config);

    let table = csv_io::read_table(&args.input, args.kind)?;
    info!("Loaded {} rows from {}", table.height(), args.input.display());

    let normalized = normalize(&normalizer, args.kind, &table)
        .with_context(|| format!("normalizing {}", args.input.display()))?;

    let report = &normalized.report;
    if !report.parse_failures.is_empty() {
        warn!("{} rows kept with null derived fields", report.parse_failures.len());
    }
    for tenor in report.unimputed() {
        warn!("Tenor {} still has missing values: {:?}", tenor.column, tenor.outcome);
    }

    csv_io::write_table(&args.output, &normalized.table)?;
    info!("Wrote {} rows to {}", report.rows, args.output.display());

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(report).context("serializing report")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(())
}
