//! Market-Data Normalizer - Main Entry Point

use clap::Parser;
use normalize_cli::{init_logging, run, Args};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("=== Table Normalizer v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Normalizing {:?} batch {}", args.kind, args.input.display());

    run(&args)
}
