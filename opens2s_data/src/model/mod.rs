//! Speech tokenizer model and extraction seam.
//!
//! The converter only depends on the [`SpeechUnitExtractor`] trait, so it
//! can be exercised with a stub in tests; [`SpeechTokenizer`] is the real
//! implementation backed by the loaded VQ encoder.

use std::path::Path;

use anyhow::{Context, Result, bail};
use candle_core::Device;

pub mod config;
pub mod encoder;
pub mod loader;
pub mod quantizer;

use crate::audio::load_mono_resampled;
use crate::audio::mel::FeatureExtractor;
use crate::model::encoder::WhisperVqEncoder;

/// "Given an audio file path, return its speech unit ids."
///
/// Exactly one file per call; batching is not supported.
pub trait SpeechUnitExtractor {
    fn extract_units(&self, audio_path: &Path) -> Result<Vec<u32>>;
}

/// The loaded speech tokenizer: encoder weights plus feature extractor.
///
/// Held for the lifetime of the process and passed explicitly to every
/// function that needs it.
pub struct SpeechTokenizer {
    encoder: WhisperVqEncoder,
    feature_extractor: FeatureExtractor,
    device: Device,
}

impl SpeechTokenizer {
    pub fn new(
        encoder: WhisperVqEncoder,
        feature_extractor: FeatureExtractor,
        device: Device,
    ) -> Self {
        Self {
            encoder,
            feature_extractor,
            device,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn feature_extractor(&self) -> &FeatureExtractor {
        &self.feature_extractor
    }
}

impl SpeechUnitExtractor for SpeechTokenizer {
    /// Extract speech units from one audio file.
    ///
    /// Audio is decoded, downmixed to mono, resampled to the tokenizer's
    /// sample rate, and processed in 30-second feature windows; the unit
    /// ids of all windows are concatenated in order.
    fn extract_units(&self, audio_path: &Path) -> Result<Vec<u32>> {
        if !audio_path.exists() {
            bail!("Audio file not found: {}", audio_path.display());
        }

        let sample_rate = self.feature_extractor.config().sampling_rate;
        let samples = load_mono_resampled(audio_path, sample_rate)
            .with_context(|| format!("Failed to load audio {}", audio_path.display()))?;

        let chunk_samples = self.feature_extractor.config().chunk_samples();
        let mut units = Vec::new();

        for chunk in samples.chunks(chunk_samples) {
            let features = self
                .feature_extractor
                .features(chunk, &self.device)
                .context("Feature extraction failed")?;
            if features.dim(2).context("Bad feature shape")? == 0 {
                continue;
            }
            let codes = self
                .encoder
                .encode(&features)
                .context("Encoder forward pass failed")?;
            units.extend(codes);
        }

        tracing::debug!(
            path = %audio_path.display(),
            samples = samples.len(),
            units = units.len(),
            "Extracted speech units"
        );

        Ok(units)
    }
}
