//! Batch construction of Opens2S training data.
//!
//! Reads a newline-delimited JSON dataset of instruction/response audio
//! pairs, extracts speech units from each response audio with the speech
//! tokenizer, and writes the converted conversations as JSONL.
//!
//! # Usage
//!
//! ```bash
//! construct-opens2s-data input.jsonl ./out/ \
//!     --prefix-path /data/ultravoice \
//!     --tokenizer-path zai-org/glm-4-voice-tokenizer \
//!     --device cuda --skip-errors --verbose
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use candle_core::DType;
use clap::Parser;

use opens2s_data::convert::batch::{BatchOptions, run_batch};
use opens2s_data::io::jsonl::{read_input_records, write_training_records};
use opens2s_data::io::output_path::derive_output_path;
use opens2s_data::io::tokenizer_path::resolve_tokenizer_path;
use opens2s_data::model::loader::{TokenizerLoader, resolve_device};

/// Batch-construct the Opens2S dataset from a raw JSONL dataset.
#[derive(Parser, Debug)]
#[command(name = "construct-opens2s-data")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input JSONL file path
    input_jsonl: PathBuf,

    /// Output directory path
    output_dir: PathBuf,

    /// Prefix directory for resolving relative audio paths
    #[arg(long, default_value = "data")]
    prefix_path: PathBuf,

    /// Speech tokenizer model directory or HuggingFace model id
    #[arg(long, default_value = "zai-org/glm-4-voice-tokenizer")]
    tokenizer_path: String,

    /// Device to use
    #[arg(long, default_value = "cuda", value_parser = ["cuda", "cpu"])]
    device: String,

    /// Batch size (only 1 is supported)
    #[arg(long, default_value_t = 1)]
    batch_size: usize,

    /// Skip failed items and keep processing
    #[arg(long)]
    skip_errors: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.batch_size != 1 {
        bail!("Only --batch-size 1 is supported");
    }

    if !args.input_jsonl.exists() {
        bail!("Input file does not exist: {}", args.input_jsonl.display());
    }
    if !args.prefix_path.exists() {
        bail!("Prefix path does not exist: {}", args.prefix_path.display());
    }

    fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    let output_jsonl = derive_output_path(&args.input_jsonl, &args.output_dir);
    println!("Output will be saved to: {}", output_jsonl.display());

    let device = resolve_device(&args.device)?;
    let tokenizer_dir = resolve_tokenizer_path(&args.tokenizer_path)?;

    tracing::info!(
        tokenizer = %tokenizer_dir.display(),
        device = ?device,
        "Tokenizer configuration"
    );

    println!("Loading speech tokenizer...");
    let loader = TokenizerLoader::from_local_dir(&tokenizer_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create tokenizer loader: {}", e))?;
    let tokenizer = loader
        .load(&device, DType::F32)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
    println!("Tokenizer loaded!");

    let items = read_input_records(&args.input_jsonl)?;
    println!("Read {} input records", items.len());

    let options = BatchOptions {
        skip_errors: args.skip_errors,
        verbose: args.verbose,
    };
    let summary = run_batch(&items, &args.prefix_path, &tokenizer, &options)?;

    write_training_records(&output_jsonl, &summary.records)?;

    println!("Conversion complete!");
    println!("Converted: {} records", summary.converted());
    if summary.skipped > 0 {
        println!("Skipped:   {} records", summary.skipped);
    }
    println!("Saved to:  {}", output_jsonl.display());

    Ok(())
}
