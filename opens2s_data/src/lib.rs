//! # Opens2S data construction
//!
//! Converts raw instruction/response audio-text pairs into the Opens2S
//! training format by running response audio through a pretrained speech
//! tokenizer (a Whisper-style VQ encoder) and rendering the resulting
//! discrete speech units as text markers.
//!
//! This crate provides:
//! - Speech tokenizer loading and inference (`model`)
//! - Audio decoding and log-mel feature extraction (`audio`)
//! - Speech unit marker formatting (`units`)
//! - Record conversion and the batch driver (`convert`)
//! - JSONL input/output (`io`)
//!
//! ## Example
//!
//! ```no_run
//! use candle_core::{DType, Device};
//! use opens2s_data::model::SpeechUnitExtractor;
//! use opens2s_data::model::loader::TokenizerLoader;
//! use opens2s_data::units::format_speech_units;
//!
//! # fn main() -> anyhow::Result<()> {
//! let loader = TokenizerLoader::from_local_dir("/path/to/tokenizer")?;
//! let tokenizer = loader.load(&Device::Cpu, DType::F32)?;
//! let units = tokenizer.extract_units("response.wav".as_ref())?;
//! println!("{}", format_speech_units(&units));
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod convert;
pub mod io;
pub mod model;
pub mod units;
