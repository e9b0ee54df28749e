use candle_core::{Result as CandleResult, Tensor};
use candle_nn::{init::Init, VarBuilder};

use crate::llm::layer::Layer;

pub struct LayerNormLayer {
    weights: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNormLayer {
    pub fn new(vb: &VarBuilder, prefix: &str, size: usize, eps: f64) -> CandleResult<Self> {
        let weights = vb.get_with_hints(size, &format!("{}.weight", prefix), Init::Const(1.0))?;
        let bias = vb.get_with_hints(size, &format!("{}.bias", prefix), Init::Const(0.0))?;

        Ok(Self { weights, bias, eps })
    }
}

impl Layer for LayerNormLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let orig_dtype = input.dtype();
        let input = input.to_dtype(candle_core::DType::F32)?;

        let mean = input.mean_keepdim(candle_core::D::Minus1)?;
        let centered = input.broadcast_sub(&mean)?;
        let variance = centered.sqr()?.mean_keepdim(candle_core::D::Minus1)?;
        let inv_std = variance.affine(1.0, self.eps)?.sqrt()?.recip()?;

        let norm_x = centered.broadcast_mul(&inv_std)?.to_dtype(orig_dtype)?;

        norm_x.broadcast_mul(&self.weights)?.broadcast_add(&self.bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn normalizes_to_zero_mean_unit_variance() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let norm = LayerNormLayer::new(&vb, "ln_f", 4, 1e-5).unwrap();

        let input = Tensor::new(&[[1.0f32, 2.0, 3.0, 4.0]], &Device::Cpu).unwrap();
        let out = norm.forward(&input).unwrap().to_vec2::<f32>().unwrap();

        let mean: f32 = out[0].iter().sum::<f32>() / 4.0;
        let var: f32 = out[0].iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-3);
        assert!(out[0][0] < out[0][3]);
    }
}
