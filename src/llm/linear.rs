use candle_core::{Result as CandleResult, Tensor};
use candle_nn::{init::Init, VarBuilder};

use crate::llm::layer::Layer;

/// Affine projection with GPT-2's Conv1D weight layout: `[in_dim, out_dim]`.
pub struct LinearLayer {
    weights: Tensor,
    bias: Tensor,
}

impl LinearLayer {
    pub fn new(vb: &VarBuilder, prefix: &str, in_dim: usize, out_dim: usize) -> CandleResult<Self> {
        let weights = vb.get_with_hints(
            (in_dim, out_dim),
            &format!("{}.weight", prefix),
            Init::Randn { mean: 0.0, stdev: 0.02 },
        )?;
        let bias = vb.get_with_hints(out_dim, &format!("{}.bias", prefix), Init::Const(0.0))?;

        Ok(Self { weights, bias })
    }
}

impl Layer for LinearLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        input.broadcast_matmul(&self.weights)?.broadcast_add(&self.bias)
    }
}
