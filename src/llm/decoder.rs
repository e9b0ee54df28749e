use candle_core::{Device, Result as CandleResult, Tensor};
use candle_nn::VarBuilder;

use crate::config::ModelConfig;
use crate::llm::activation::Activation;
use crate::llm::causal_self_attention::{CausalSelfAttentionLayer, KVCache};
use crate::llm::layer::Layer;
use crate::llm::layer_norm::LayerNormLayer;
use crate::llm::mlp::MlpLayer;

/// One pre-norm GPT-2 block (`h.{i}`).
pub struct DecoderLayer {
    pub ln_1: LayerNormLayer,
    pub attn: CausalSelfAttentionLayer,
    pub ln_2: LayerNormLayer,
    pub mlp: MlpLayer,
    pub device: Device,
}

impl DecoderLayer {
    pub fn new(vb: &VarBuilder, prefix: &str, config: &ModelConfig, device: &Device) -> CandleResult<Self> {
        let ln_1 = LayerNormLayer::new(
            vb,
            &format!("{}.ln_1", prefix),
            config.n_embd,
            config.layer_norm_epsilon,
        )?;

        let attn = CausalSelfAttentionLayer::new(
            vb,
            &format!("{}.attn", prefix),
            config.n_head,
            config.n_embd,
            device,
        )?;

        let ln_2 = LayerNormLayer::new(
            vb,
            &format!("{}.ln_2", prefix),
            config.n_embd,
            config.layer_norm_epsilon,
        )?;

        let mlp = MlpLayer::new(
            vb,
            &format!("{}.mlp", prefix),
            config.n_embd,
            config.inner_dim(),
            Activation::from_name(&config.activation_function)?,
        )?;

        Ok(Self {
            ln_1,
            attn,
            ln_2,
            mlp,
            device: device.clone(),
        })
    }

    pub fn forward_with_cache(&self, input: &Tensor, kv_cache: &mut KVCache) -> CandleResult<Tensor> {
        let input = input.to_device(&self.device)?;
        let normed_input = self.ln_1.forward(&input)?;
        let attn_output = self.attn.forward_with_cache(&normed_input, kv_cache)?;
        let attn_residual = input.add(&attn_output)?;

        let normed_attn = self.ln_2.forward(&attn_residual)?;
        let mlp_output = self.mlp.forward(&normed_attn)?;
        attn_residual.add(&mlp_output)
    }
}

impl Layer for DecoderLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let mut cache = KVCache::new();
        self.forward_with_cache(input, &mut cache)
    }
}
