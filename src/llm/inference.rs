use candle_core::Result as CandleResult;
use candle_core::{Device, IndexOp, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::llm::causal_self_attention::KVCache;
use crate::llm::models::Model;

/// Sampling knobs applied to every request. Callers cannot change them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub top_k: usize,
    pub top_p: f64,
    pub temperature: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            top_k: 50,
            top_p: 0.95,
            temperature: 0.7,
        }
    }
}

impl SamplingParams {
    /// Temperature scaling, then top-k and nucleus truncation applied jointly.
    pub fn logits_processor(&self, seed: u64) -> LogitsProcessor {
        LogitsProcessor::from_sampling(
            seed,
            Sampling::TopKThenTopP {
                k: self.top_k,
                p: self.top_p,
                temperature: self.temperature,
            },
        )
    }
}

/// Extends `prompt_ids` by sampling until the sequence holds `max_length`
/// tokens or `eos_token_id` is drawn.
///
/// `max_length` counts the prompt too: a prompt that already has
/// `max_length` tokens or more comes back unchanged, without a forward pass.
/// The EOS token itself is not appended.
pub fn generate(
    prompt_ids: &[u32],
    max_length: usize,
    model: &dyn Model,
    device: &Device,
    sampler: &mut LogitsProcessor,
    eos_token_id: u32,
) -> CandleResult<Vec<u32>> {
    let mut token_ids = prompt_ids.to_vec();
    if token_ids.len() >= max_length {
        return Ok(token_ids);
    }

    let mut kv_caches: Vec<KVCache> = vec![KVCache::new(); model.num_layers()];

    // First pass feeds the whole prompt, later passes only the newest token.
    let mut pending = token_ids.clone();
    while token_ids.len() < max_length {
        let input_tensor = Tensor::new(pending.as_slice(), device)?.unsqueeze(0)?;
        let output = model.forward_with_cache(&input_tensor, &mut kv_caches)?;

        let next_token_logits = output.i((0, output.dim(1)? - 1))?;
        let next_token = sampler.sample(&next_token_logits)?;

        if next_token == eos_token_id {
            break;
        }

        token_ids.push(next_token);
        pending = vec![next_token];
    }

    Ok(token_ids)
}
