//! Standalone speech token extraction for a single audio file.
//!
//! # Usage
//!
//! ```bash
//! # Print markers to stdout
//! extract-speech-token response.wav --tokenizer-path /models/tokenizer
//!
//! # Raw comma-joined ids into a file
//! extract-speech-token response.wav --format raw --output tokens.txt
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::DType;
use clap::{Parser, ValueEnum};

use opens2s_data::io::tokenizer_path::resolve_tokenizer_path;
use opens2s_data::model::SpeechUnitExtractor;
use opens2s_data::model::loader::{TokenizerLoader, resolve_device};
use opens2s_data::units::{UnitFormat, format_units};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    /// `<|audio_{id}|>` markers
    Special,
    /// Comma-joined decimal ids
    Raw,
}

impl From<CliFormat> for UnitFormat {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Special => UnitFormat::Special,
            CliFormat::Raw => UnitFormat::Raw,
        }
    }
}

/// Extract speech tokens from one audio file.
#[derive(Parser, Debug)]
#[command(name = "extract-speech-token")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input audio file path
    audio_path: PathBuf,

    /// Speech tokenizer model directory or HuggingFace model id
    #[arg(long, default_value = "zai-org/glm-4-voice-tokenizer")]
    tokenizer_path: String,

    /// Device to use
    #[arg(long, default_value = "cuda", value_parser = ["cuda", "cpu"])]
    device: String,

    /// Output file path (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = CliFormat::Special)]
    format: CliFormat,

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

    let device = resolve_device(&args.device)?;
    let tokenizer_dir = resolve_tokenizer_path(&args.tokenizer_path)?;

    tracing::info!(
        tokenizer = %tokenizer_dir.display(),
        device = ?device,
        "Tokenizer configuration"
    );

    let loader = TokenizerLoader::from_local_dir(&tokenizer_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create tokenizer loader: {}", e))?;
    let tokenizer = loader
        .load(&device, DType::F32)
        .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

    tracing::info!(audio = %args.audio_path.display(), "Extracting speech tokens");
    let units = tokenizer.extract_units(&args.audio_path)?;

    if units.is_empty() {
        tracing::warn!("No speech tokens extracted");
    }

    let formatted = format_units(&units, args.format.into());

    match &args.output {
        Some(path) => {
            fs::write(path, &formatted)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Result saved to: {}", path.display());
        }
        None => {
            if args.verbose {
                println!("=== Extraction result ===");
                println!("Token count: {}", units.len());
            }
            println!("{formatted}");
        }
    }

    Ok(())
}
