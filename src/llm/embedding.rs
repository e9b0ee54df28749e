use candle_core::{Device, Result as CandleResult, Tensor};
use candle_nn::{init::Init, VarBuilder};

use crate::llm::layer::Layer;

/// Lookup table mapping ids (token ids or positions) to `n_embd` vectors.
pub struct EmbeddingLayer {
    weights: Tensor,
    device: Device,
}

impl EmbeddingLayer {
    pub fn new(
        vb: &VarBuilder,
        prefix: &str,
        num_embeddings: usize,
        dim: usize,
        device: &Device,
    ) -> CandleResult<Self> {
        let weights = vb.get_with_hints(
            (num_embeddings, dim),
            &format!("{}.weight", prefix),
            Init::Randn { mean: 0.0, stdev: 0.02 },
        )?;

        Ok(Self {
            weights,
            device: device.clone(),
        })
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }
}

impl Layer for EmbeddingLayer {
    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor> {
        let input_ids = input_ids.to_device(&self.device)?;

        let (batch_size, seq_length) = input_ids.dims2()?;

        let flat_input = input_ids.reshape(batch_size * seq_length)?;

        let flat_embeddings = self.weights.index_select(&flat_input, 0)?;

        flat_embeddings.reshape((batch_size, seq_length, self.weights.dim(1)?))
    }
}
