use candle_core::{Device, Result as CandleResult, Tensor};
use candle_nn::VarBuilder;

use crate::config::ModelConfig;
use crate::llm::causal_self_attention::KVCache;
use crate::llm::decoder::DecoderLayer;
use crate::llm::embedding::EmbeddingLayer;
use crate::llm::layer::Layer;
use crate::llm::layer_norm::LayerNormLayer;
use crate::llm::lm_head::LMHeadLayer;

pub trait Model {
    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor>;
    /// `input_ids` are the tokens following the `kv_caches` contents; returns
    /// logits of shape `(batch, seq_len, vocab)`.
    fn forward_with_cache(&self, input_ids: &Tensor, kv_caches: &mut [KVCache]) -> CandleResult<Tensor>;
    fn num_layers(&self) -> usize;
    /// Longest sequence the position table can address.
    fn max_positions(&self) -> usize;
}

/// GPT-2 with its language-modeling head.
///
/// The graph has no dropout and the weights are never updated, so a forward
/// pass is always in inference mode.
pub struct Gpt2Model {
    pub device: Device,
    pub wte: EmbeddingLayer,
    pub wpe: EmbeddingLayer,
    pub blocks: Vec<DecoderLayer>,
    pub ln_f: LayerNormLayer,
    pub lm_head: LMHeadLayer,
    pub cfg: ModelConfig,
}

impl Gpt2Model {
    /// Accepts both the `transformer.`-prefixed names written by
    /// `GPT2LMHeadModel.save_pretrained` and the bare names of the hub `gpt2`
    /// checkpoints. `lm_head.weight` is used when present, otherwise the head
    /// is tied to `wte`.
    pub fn new(vb: &VarBuilder, config: &ModelConfig, device: &Device) -> CandleResult<Self> {
        let body = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb.clone()
        };

        let wte = EmbeddingLayer::new(&body, "wte", config.vocab_size, config.n_embd, device)?;
        let wpe = EmbeddingLayer::new(&body, "wpe", config.n_positions, config.n_embd, device)?;

        let blocks = (0..config.n_layer)
            .map(|layer_idx| DecoderLayer::new(&body, &format!("h.{}", layer_idx), config, device))
            .collect::<CandleResult<Vec<_>>>()?;

        let ln_f = LayerNormLayer::new(&body, "ln_f", config.n_embd, config.layer_norm_epsilon)?;

        let lm_head = if vb.contains_tensor("lm_head.weight") {
            LMHeadLayer::new(vb.get((config.vocab_size, config.n_embd), "lm_head.weight")?)
        } else {
            LMHeadLayer::new(wte.weights().clone())
        };

        Ok(Self {
            device: device.clone(),
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            cfg: config.clone(),
        })
    }
}

impl Model for Gpt2Model {
    fn forward(&self, input_ids: &Tensor) -> CandleResult<Tensor> {
        let mut kv_caches = vec![KVCache::new(); self.blocks.len()];
        self.forward_with_cache(input_ids, &mut kv_caches)
    }

    fn forward_with_cache(&self, input_ids: &Tensor, kv_caches: &mut [KVCache]) -> CandleResult<Tensor> {
        let input_ids = input_ids.to_device(&self.device)?;
        let (batch_size, seq_len) = input_ids.dims2()?;

        let past_len = match kv_caches.first() {
            Some(cache) => cache.len()?,
            None => 0,
        };
        if past_len + seq_len > self.max_positions() {
            return Err(candle_core::Error::msg(format!(
                "sequence length {} exceeds the model context of {} positions",
                past_len + seq_len,
                self.max_positions()
            )));
        }

        let positions = Tensor::arange(past_len as u32, (past_len + seq_len) as u32, &self.device)?
            .unsqueeze(0)?
            .broadcast_as((batch_size, seq_len))?
            .contiguous()?;

        let token_embeddings = self.wte.forward(&input_ids)?;
        let position_embeddings = self.wpe.forward(&positions)?;
        let mut hidden_states = token_embeddings.add(&position_embeddings)?;

        for (block, cache) in self.blocks.iter().zip(kv_caches.iter_mut()) {
            hidden_states = block.forward_with_cache(&hidden_states, cache)?;
        }

        let normed_output = self.ln_f.forward(&hidden_states)?;
        self.lm_head.forward(&normed_output)
    }

    fn num_layers(&self) -> usize {
        self.blocks.len()
    }

    fn max_positions(&self) -> usize {
        self.cfg.n_positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{tiny_config, tiny_model};
    use candle_core::{DType, IndexOp};
    use candle_nn::VarMap;

    #[test]
    fn logits_cover_the_vocabulary() {
        let model = tiny_model();
        let input = Tensor::new(&[[1u32, 2, 3]], &Device::Cpu).unwrap();
        let logits = model.forward(&input).unwrap();
        assert_eq!(logits.dims(), &[1, 3, tiny_config().vocab_size]);
    }

    #[test]
    fn cached_decoding_matches_full_forward() {
        let model = tiny_model();
        let full = Tensor::new(&[[4u32, 5, 6, 7]], &Device::Cpu).unwrap();
        let expected = model.forward(&full).unwrap().i((0, 3)).unwrap();

        let mut caches = vec![KVCache::new(); model.num_layers()];
        let prompt = Tensor::new(&[[4u32, 5, 6]], &Device::Cpu).unwrap();
        model.forward_with_cache(&prompt, &mut caches).unwrap();
        let step = Tensor::new(&[[7u32]], &Device::Cpu).unwrap();
        let actual = model.forward_with_cache(&step, &mut caches).unwrap().i((0, 0)).unwrap();

        let diff = (expected - actual)
            .unwrap()
            .abs()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-4, "max abs diff {}", diff);
    }

    #[test]
    fn rejects_sequences_past_the_position_table() {
        let model = tiny_model();
        let ids: Vec<u32> = vec![1; model.max_positions() + 1];
        let input = Tensor::new(ids.as_slice(), &Device::Cpu).unwrap().unsqueeze(0).unwrap();
        assert!(model.forward(&input).is_err());
    }

    #[test]
    fn prefers_explicit_lm_head_and_prefixed_names() {
        let cfg = tiny_config();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        // Registering these first makes contains_tensor report them.
        vb.get_with_hints((cfg.vocab_size, cfg.n_embd), "transformer.wte.weight", candle_nn::init::Init::Const(0.0))
            .unwrap();
        vb.get_with_hints((cfg.vocab_size, cfg.n_embd), "lm_head.weight", candle_nn::init::Init::Const(1.0))
            .unwrap();

        let model = Gpt2Model::new(&vb, &cfg, &Device::Cpu).unwrap();
        assert!(varmap.data().lock().unwrap().contains_key("transformer.h.0.attn.c_attn.weight"));

        let input = Tensor::new(&[[1u32]], &Device::Cpu).unwrap();
        let logits = model.forward(&input).unwrap().flatten_all().unwrap().to_vec1::<f32>().unwrap();
        // An all-ones head gives every vocabulary entry the same logit.
        assert!(logits.windows(2).all(|w| (w[0] - w[1]).abs() < 1e-4));
    }
}
