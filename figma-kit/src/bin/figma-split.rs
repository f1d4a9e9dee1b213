//! Standalone splitter: `figma-split <input.json> [--output-dir DIR] [--max-lines N]`.

use anyhow::Result;
use clap::Parser;
use figma_kit_core::split::{split_file, DEFAULT_MAX_LINES};
use std::path::PathBuf;

/// Split a large Figma node JSON file into files under a line budget.
#[derive(Parser)]
#[clap(name = "figma-split", version)]
struct Args {
    /// Node JSON as written by `figma-kit nodes --output`
    input: PathBuf,

    /// Defaults to `<input stem>-split` next to the input
    #[clap(long, short)]
    output_dir: Option<PathBuf>,

    #[clap(long, default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,
}

fn main() -> Result<()> {
    figma_kit::init_tracing();

    let args = Args::parse();
    tracing::info!(input = %args.input.display(), max_lines = args.max_lines, "figma-split starting");

    let report = split_file(&args.input, args.output_dir.as_deref(), args.max_lines)?;
    println!("Split complete: {}", report.output_dir.display());
    for file in &report.files {
        println!("  {file}");
    }
    Ok(())
}
