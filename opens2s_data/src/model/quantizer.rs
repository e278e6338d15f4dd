//! Single-codebook vector quantizer.

use candle_core::{D, Result, Tensor};
use candle_nn::VarBuilder;

/// Codebook lookup: maps encoder states to their nearest codebook entry.
#[derive(Debug, Clone)]
pub struct VectorQuantizer {
    embeddings: Tensor,
}

impl VectorQuantizer {
    pub fn new(codebook_size: usize, dim: usize, vb: VarBuilder) -> Result<Self> {
        let embeddings = vb.get((codebook_size, dim), "weight")?;
        Ok(Self { embeddings })
    }

    /// Map hidden states `[B, T, dim]` to code indices `[B, T]`.
    pub fn encode(&self, xs: &Tensor) -> Result<Tensor> {
        let orig_shape = xs.dims().to_vec();
        let xs = xs.flatten_to(D::Minus2)?; // [B*T, dim]

        // argmin ||x - e||^2 == argmin (||e||^2 / 2 - x.e), ||x||^2 is constant.
        let c2 = self.embeddings.sqr()?.sum(D::Minus1)?.affine(0.5, 0.)?;
        let dot = xs.matmul(&self.embeddings.t()?)?;
        let dist = c2.broadcast_sub(&dot)?;
        let codes = dist.argmin(D::Minus1)?;

        let mut new_shape = orig_shape;
        new_shape.pop();
        codes.reshape(new_shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    fn quantizer_with_codebook(rows: Vec<Vec<f32>>) -> VectorQuantizer {
        let device = Device::Cpu;
        let size = rows.len();
        let dim = rows[0].len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let weight = Tensor::from_vec(flat, (size, dim), &device).unwrap();
        let mut tensors = HashMap::new();
        tensors.insert("weight".to_string(), weight);
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        VectorQuantizer::new(size, dim, vb).unwrap()
    }

    #[test]
    fn test_nearest_code() -> Result<()> {
        let q = quantizer_with_codebook(vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![-1.0, -1.0],
        ]);

        let xs = Tensor::from_vec(
            vec![0.9f32, 1.1, -0.8, -1.2, 0.1, -0.1],
            (1, 3, 2),
            &Device::Cpu,
        )?;
        let codes = q.encode(&xs)?;
        assert_eq!(codes.to_vec2::<u32>()?, vec![vec![1, 2, 0]]);
        Ok(())
    }

    #[test]
    fn test_code_shape_follows_input() -> Result<()> {
        let q = quantizer_with_codebook(vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
        let xs = Tensor::zeros((2, 5, 2), DType::F32, &Device::Cpu)?;
        let codes = q.encode(&xs)?;
        assert_eq!(codes.dims(), &[2, 5]);
        Ok(())
    }
}
