//! Speech tokenizer loading.
//!
//! `from_pretrained`-style loading from a local model directory containing:
//! - `config.json`: encoder configuration
//! - `preprocessor_config.json`: feature extractor configuration
//! - `model.safetensors`: encoder weights
//!
//! # Example
//!
//! ```no_run
//! use candle_core::{DType, Device};
//! use opens2s_data::model::loader::TokenizerLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = TokenizerLoader::from_local_dir("/path/to/tokenizer")?;
//! let tokenizer = loader.load(&Device::Cpu, DType::F32)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;

use crate::audio::mel::{FeatureExtractor, FeatureExtractorConfig};
use crate::model::SpeechTokenizer;
use crate::model::config::WhisperVqConfig;
use crate::model::encoder::WhisperVqEncoder;

/// Errors that can occur during tokenizer loading.
#[derive(Debug)]
pub enum LoadError {
    /// Config file not found or invalid
    ConfigError(String),
    /// Model weights file not found or invalid
    WeightsError(String),
    /// Candle error during loading
    CandleError(candle_core::Error),
    /// IO error
    IoError(std::io::Error),
    /// JSON parsing error
    JsonError(serde_json::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Self::WeightsError(msg) => write!(f, "Weights error: {}", msg),
            Self::CandleError(e) => write!(f, "Candle error: {}", e),
            Self::IoError(e) => write!(f, "IO error: {}", e),
            Self::JsonError(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<candle_core::Error> for LoadError {
    fn from(e: candle_core::Error) -> Self {
        Self::CandleError(e)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        Self::JsonError(e)
    }
}

/// Loader for the Whisper VQ speech tokenizer.
#[derive(Debug)]
pub struct TokenizerLoader {
    model_dir: PathBuf,
    model_config: WhisperVqConfig,
    feature_config: FeatureExtractorConfig,
}

impl TokenizerLoader {
    /// Create a loader from a local model directory.
    pub fn from_local_dir(model_dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let model_dir = model_dir.as_ref().to_path_buf();

        let config_path = model_dir.join("config.json");
        let config_str = std::fs::read_to_string(&config_path).map_err(|e| {
            LoadError::ConfigError(format!(
                "Failed to read config.json at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let model_config: WhisperVqConfig = serde_json::from_str(&config_str)?;

        let feature_config = Self::try_load_feature_config(&model_dir);

        Ok(Self {
            model_dir,
            model_config,
            feature_config,
        })
    }

    fn try_load_feature_config(model_dir: &Path) -> FeatureExtractorConfig {
        let path = model_dir.join("preprocessor_config.json");
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::debug!("Loaded feature extractor config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid preprocessor_config.json, using whisper-large-v3 defaults"
                    );
                    FeatureExtractorConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No preprocessor_config.json in {}, using whisper-large-v3 defaults",
                    model_dir.display()
                );
                FeatureExtractorConfig::default()
            }
        }
    }

    /// Get the model directory path.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Get the model configuration.
    pub fn model_config(&self) -> &WhisperVqConfig {
        &self.model_config
    }

    /// Get the feature extractor configuration.
    pub fn feature_config(&self) -> &FeatureExtractorConfig {
        &self.feature_config
    }

    /// Find the model weights file.
    ///
    /// Looks for a single safetensors file first, then sorted shards.
    fn find_weights_file(&self) -> Option<PathBuf> {
        let possible_files = ["model.safetensors", "model-00001-of-00001.safetensors"];
        for filename in &possible_files {
            let path = self.model_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(entries) = std::fs::read_dir(&self.model_dir) {
            let mut shards: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("model-") && n.ends_with(".safetensors"))
                })
                .collect();
            if !shards.is_empty() {
                shards.sort();
                return Some(shards[0].clone());
            }
        }

        None
    }

    /// Load the speech tokenizer onto a device.
    ///
    /// Weight loading failures are fatal: there is no fallback tokenizer.
    pub fn load(&self, device: &Device, dtype: DType) -> Result<SpeechTokenizer, LoadError> {
        let weights_path = self.find_weights_file().ok_or_else(|| {
            LoadError::WeightsError(format!(
                "No model weights found in {}",
                self.model_dir.display()
            ))
        })?;

        tracing::info!("Loading tokenizer weights from {}", weights_path.display());

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, device)? };

        let encoder = WhisperVqEncoder::new(self.model_config.clone(), vb)?;
        let feature_extractor = FeatureExtractor::new(self.feature_config.clone());

        tracing::info!(
            codebook_size = self.model_config.codebook_size,
            quantize_position = self.model_config.quantize_position,
            "Speech tokenizer loaded"
        );

        Ok(SpeechTokenizer::new(
            encoder,
            feature_extractor,
            device.clone(),
        ))
    }
}

/// Resolve the requested compute device.
///
/// Only `cuda` and `cpu` are recognized. Requesting CUDA when it is
/// unavailable downgrades to CPU with a warning instead of failing.
pub fn resolve_device(requested: &str) -> anyhow::Result<Device> {
    match requested {
        "cpu" => Ok(Device::Cpu),
        "cuda" => {
            #[cfg(feature = "cuda")]
            {
                match Device::new_cuda(0) {
                    Ok(device) => Ok(device),
                    Err(e) => {
                        tracing::warn!(error = %e, "CUDA unavailable, using CPU");
                        Ok(Device::Cpu)
                    }
                }
            }
            #[cfg(not(feature = "cuda"))]
            {
                tracing::warn!("CUDA requested but not compiled in, using CPU");
                Ok(Device::Cpu)
            }
        }
        other => anyhow::bail!("Unknown device: {}. Use cuda or cpu", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_device_cpu() {
        let device = resolve_device("cpu").unwrap();
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn test_resolve_device_rejects_unknown() {
        assert!(resolve_device("metal").is_err());
        assert!(resolve_device("").is_err());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_resolve_device_cuda_downgrades_without_support() {
        let device = resolve_device("cuda").unwrap();
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn test_loader_fails_on_missing_dir() {
        let err = TokenizerLoader::from_local_dir("/nonexistent/tokenizer").unwrap_err();
        assert!(matches!(err, LoadError::ConfigError(_)));
    }
}
