//! Speech tokenizer model configuration, loaded from `config.json`.

use serde::Deserialize;

/// Whisper VQ encoder configuration.
///
/// Defaults match the GLM-4-Voice tokenizer checkpoint (whisper-large-v3
/// encoder with a single 16384-entry codebook at layer 16, pooled 4x).
#[derive(Debug, Clone, Deserialize)]
pub struct WhisperVqConfig {
    /// Hidden size of the encoder.
    #[serde(default = "default_d_model")]
    pub d_model: usize,
    /// Total encoder layers in the checkpoint.
    #[serde(default = "default_encoder_layers")]
    pub encoder_layers: usize,
    /// Attention heads per layer.
    #[serde(default = "default_encoder_attention_heads")]
    pub encoder_attention_heads: usize,
    /// Feed-forward hidden size.
    #[serde(default = "default_encoder_ffn_dim")]
    pub encoder_ffn_dim: usize,
    /// Number of mel bins expected by the conv stem.
    #[serde(default = "default_num_mel_bins")]
    pub num_mel_bins: usize,
    /// Maximum encoder sequence length (positions after the conv stem).
    #[serde(default = "default_max_source_positions")]
    pub max_source_positions: usize,
    /// Average pooling kernel applied before quantization.
    #[serde(default = "default_pooling_kernel_size")]
    pub pooling_kernel_size: usize,
    /// Encoder layer index at which quantization happens.
    #[serde(default = "default_quantize_position")]
    pub quantize_position: usize,
    /// Number of codebook entries (the speech unit vocabulary).
    #[serde(default = "default_codebook_size")]
    pub codebook_size: usize,
}

fn default_d_model() -> usize {
    1280
}
fn default_encoder_layers() -> usize {
    32
}
fn default_encoder_attention_heads() -> usize {
    20
}
fn default_encoder_ffn_dim() -> usize {
    5120
}
fn default_num_mel_bins() -> usize {
    128
}
fn default_max_source_positions() -> usize {
    1500
}
fn default_pooling_kernel_size() -> usize {
    4
}
fn default_quantize_position() -> usize {
    16
}
fn default_codebook_size() -> usize {
    16384
}

impl Default for WhisperVqConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("empty config deserializes")
    }
}

impl WhisperVqConfig {
    pub fn head_dim(&self) -> usize {
        self.d_model / self.encoder_attention_heads
    }
}
