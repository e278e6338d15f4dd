//! Whisper-style VQ encoder.
//!
//! A bidirectional pre-norm transformer encoder over log-mel features.
//! Only the layers below the quantization point are needed to produce
//! speech units, so the acoustic layers above it are never loaded: the
//! forward pass runs conv stem -> positions -> attention blocks ->
//! average pooling -> codebook lookup and returns the code indices.

use candle_core::{Result, Tensor};
use candle_nn::{
    Conv1d, Conv1dConfig, LayerNorm, Linear, Module, VarBuilder, conv1d, layer_norm, linear,
    linear_no_bias, ops::softmax_last_dim,
};

use crate::model::config::WhisperVqConfig;
use crate::model::quantizer::VectorQuantizer;

/// Bidirectional multi-head self-attention (no mask, no positional mixing).
#[derive(Debug, Clone)]
struct SelfAttention {
    q_proj: Linear,
    k_proj: Linear,
    v_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    fn new(dim: usize, num_heads: usize, vb: VarBuilder) -> Result<Self> {
        // Whisper convention: no bias on the key projection.
        let q_proj = linear(dim, dim, vb.pp("q_proj"))?;
        let k_proj = linear_no_bias(dim, dim, vb.pp("k_proj"))?;
        let v_proj = linear(dim, dim, vb.pp("v_proj"))?;
        let out_proj = linear(dim, dim, vb.pp("out_proj"))?;

        Ok(Self {
            q_proj,
            k_proj,
            v_proj,
            out_proj,
            num_heads,
            head_dim: dim / num_heads,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, t, d) = xs.dims3()?;

        let q = self.q_proj.forward(xs)?;
        let k = self.k_proj.forward(xs)?;
        let v = self.v_proj.forward(xs)?;

        // [B, T, D] -> [B, heads, T, head_dim]
        let q = q
            .reshape((b, t, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let k = k
            .reshape((b, t, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;
        let v = v
            .reshape((b, t, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?;

        let scale = (self.head_dim as f64).sqrt();
        let k_t = k.transpose(2, 3)?.contiguous()?;
        let attn = (q.matmul(&k_t)? / scale)?;
        let attn = softmax_last_dim(&attn)?;

        let out = attn.contiguous()?.matmul(&v)?;
        let out = out.transpose(1, 2)?.reshape((b, t, d))?;
        self.out_proj.forward(&out)
    }
}

/// One pre-norm encoder block.
#[derive(Debug, Clone)]
struct EncoderLayer {
    self_attn: SelfAttention,
    self_attn_layer_norm: LayerNorm,
    fc1: Linear,
    fc2: Linear,
    final_layer_norm: LayerNorm,
}

impl EncoderLayer {
    fn new(config: &WhisperVqConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.d_model;
        let self_attn = SelfAttention::new(d, config.encoder_attention_heads, vb.pp("self_attn"))?;
        let self_attn_layer_norm = layer_norm(d, 1e-5, vb.pp("self_attn_layer_norm"))?;
        let fc1 = linear(d, config.encoder_ffn_dim, vb.pp("fc1"))?;
        let fc2 = linear(config.encoder_ffn_dim, d, vb.pp("fc2"))?;
        let final_layer_norm = layer_norm(d, 1e-5, vb.pp("final_layer_norm"))?;

        Ok(Self {
            self_attn,
            self_attn_layer_norm,
            fc1,
            fc2,
            final_layer_norm,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let residual = xs;
        let h = self.self_attn_layer_norm.forward(xs)?;
        let h = self.self_attn.forward(&h)?;
        let xs = (residual + h)?;

        let residual = &xs;
        let h = self.final_layer_norm.forward(&xs)?;
        let h = self.fc1.forward(&h)?.gelu_erf()?;
        let h = self.fc2.forward(&h)?;
        residual + h
    }
}

/// The VQ encoder: conv stem, attention blocks up to the quantization
/// point, pooling, and the codebook.
#[derive(Debug, Clone)]
pub struct WhisperVqEncoder {
    conv1: Conv1d,
    conv2: Conv1d,
    embed_positions: Tensor,
    layers: Vec<EncoderLayer>,
    quantizer: VectorQuantizer,
    config: WhisperVqConfig,
}

impl WhisperVqEncoder {
    pub fn new(config: WhisperVqConfig, vb: VarBuilder) -> Result<Self> {
        let d = config.d_model;

        let conv1 = conv1d(
            config.num_mel_bins,
            d,
            3,
            Conv1dConfig {
                padding: 1,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let conv2 = conv1d(
            d,
            d,
            3,
            Conv1dConfig {
                padding: 1,
                stride: 2,
                ..Default::default()
            },
            vb.pp("conv2"),
        )?;

        let embed_positions = vb.get(
            (config.max_source_positions, d),
            "embed_positions.weight",
        )?;

        // Layers above quantize_position only refine acoustics for the
        // decoder side of the checkpoint and never affect the codes.
        let layers = (0..config.quantize_position)
            .map(|i| EncoderLayer::new(&config, vb.pp(format!("layers.{i}"))))
            .collect::<Result<Vec<_>>>()?;

        let quantizer = VectorQuantizer::new(config.codebook_size, d, vb.pp("codebook"))?;

        Ok(Self {
            conv1,
            conv2,
            embed_positions,
            layers,
            quantizer,
            config,
        })
    }

    pub fn config(&self) -> &WhisperVqConfig {
        &self.config
    }

    /// Encode one chunk of log-mel features `(1, num_mel_bins, frames)`
    /// into speech unit ids.
    pub fn encode(&self, mel: &Tensor) -> Result<Vec<u32>> {
        if mel.dim(2)? == 0 {
            return Ok(Vec::new());
        }
        let h = self.conv1.forward(mel)?.gelu_erf()?;
        let h = self.conv2.forward(&h)?.gelu_erf()?;

        // [B, D, T] -> [B, T, D]
        let h = h.transpose(1, 2)?.contiguous()?;
        let t = h.dim(1)?;
        if t == 0 {
            return Ok(Vec::new());
        }

        let positions = self.embed_positions.narrow(0, 0, t)?;
        let mut h = h.broadcast_add(&positions)?;

        for layer in &self.layers {
            h = layer.forward(&h)?;
        }

        // Average pooling over time before the codebook lookup.
        let pool = self.config.pooling_kernel_size;
        let t_out = t / pool;
        if t_out == 0 {
            return Ok(Vec::new());
        }
        let d = self.config.d_model;
        let h = h.narrow(1, 0, t_out * pool)?;
        let h = h.reshape((1, t_out, pool, d))?.mean(2)?;

        let codes = self.quantizer.encode(&h)?;
        Ok(codes.to_vec2::<u32>()?.into_iter().flatten().collect())
    }
}
