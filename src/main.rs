use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::prelude::*;

use onebrc_pipeline::{Pipeline, PipelineConfig};

/// Aggregates a `key;value` measurement file into per-key min/mean/max.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input file, one `key;value` record per line.
    path: PathBuf,

    /// Reader thread count.
    #[arg(long)]
    readers: Option<usize>,

    /// Worker thread count.
    #[arg(long)]
    workers: Option<usize>,

    /// Number of line-aligned chunks to plan.
    #[arg(long)]
    chunks: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    let args = Args::parse();
    let mut config = PipelineConfig::default();
    if let Some(readers) = args.readers {
        config.readers = readers;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(chunks) = args.chunks {
        config.chunk_count = chunks;
    }

    let report = Pipeline::new(config)
        .process(&args.path)
        .with_context(|| format!("aggregating {}", args.path.display()))?;
    println!("{report}");
    Ok(())
}
