use candle_core::{Result as CandleResult, Tensor};

use crate::llm::layer::Layer;

/// Projects hidden states to vocabulary logits with a `[vocab, n_embd]` matrix.
///
/// GPT-2 ties this matrix to the token embedding, so the usual source is
/// [`EmbeddingLayer::weights`](crate::llm::embedding::EmbeddingLayer::weights).
pub struct LMHeadLayer {
    weights: Tensor,
}

impl LMHeadLayer {
    pub fn new(weights: Tensor) -> Self {
        Self { weights }
    }
}

impl Layer for LMHeadLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        input.broadcast_matmul(&self.weights.t()?)
    }
}
