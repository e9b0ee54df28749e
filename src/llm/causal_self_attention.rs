use candle_core::{Device, Result as CandleResult, Tensor};
use candle_nn::VarBuilder;

use crate::llm::layer::Layer;
use crate::llm::linear::LinearLayer;

/// KV cache for storing key and value tensors across generation steps
#[derive(Clone, Default)]
pub struct KVCache {
    pub k_cache: Option<Tensor>,
    pub v_cache: Option<Tensor>,
}

impl KVCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> CandleResult<usize> {
        match &self.k_cache {
            Some(k) => k.dim(2),
            None => Ok(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.k_cache.is_none()
    }
}

/// GPT-2 multi-head attention: one fused `c_attn` projection for q, k and v,
/// followed by the `c_proj` output projection.
pub struct CausalSelfAttentionLayer {
    c_attn: LinearLayer,
    c_proj: LinearLayer,
    n_heads: usize,
    hidden_size: usize,
    device: Device,
}

impl CausalSelfAttentionLayer {
    pub fn new(
        vb: &VarBuilder,
        prefix: &str,
        n_heads: usize,
        hidden_size: usize,
        device: &Device,
    ) -> CandleResult<Self> {
        if hidden_size % n_heads != 0 {
            return Err(candle_core::Error::msg(format!(
                "n_embd ({}) is not divisible by n_head ({})",
                hidden_size, n_heads
            )));
        }

        let c_attn = LinearLayer::new(vb, &format!("{}.c_attn", prefix), hidden_size, 3 * hidden_size)?;
        let c_proj = LinearLayer::new(vb, &format!("{}.c_proj", prefix), hidden_size, hidden_size)?;

        Ok(Self {
            c_attn,
            c_proj,
            n_heads,
            hidden_size,
            device: device.clone(),
        })
    }

    /// Additive mask of shape `(seq_len, past_len + seq_len)`: query `i` sits at
    /// absolute position `past_len + i` and may only see keys up to it.
    pub(crate) fn create_causal_mask(seq_len: usize, past_len: usize, device: &Device) -> CandleResult<Tensor> {
        let total_len = past_len + seq_len;
        let mask = (0..seq_len)
            .flat_map(|i| {
                (0..total_len).map(move |j| if j > past_len + i { f32::NEG_INFINITY } else { 0.0 })
            })
            .collect::<Vec<f32>>();

        Tensor::from_vec(mask, (seq_len, total_len), device)
    }

    fn split_heads(&self, x: &Tensor, b_sz: usize, seq_len: usize) -> CandleResult<Tensor> {
        let head_dim = self.hidden_size / self.n_heads;
        x.reshape((b_sz, seq_len, self.n_heads, head_dim))?
            .transpose(1, 2)? // (b_sz, n_heads, seq_len, head_dim)
            .contiguous()
    }

    /// Forward pass with KV cache support
    pub fn forward_with_cache(&self, input: &Tensor, kv_cache: &mut KVCache) -> CandleResult<Tensor> {
        let input = input.to_device(&self.device)?;
        let (b_sz, seq_len, _) = input.dims3()?;
        let head_dim = self.hidden_size / self.n_heads;

        let qkv = self.c_attn.forward(&input)?;
        let q = qkv.narrow(candle_core::D::Minus1, 0, self.hidden_size)?;
        let k = qkv.narrow(candle_core::D::Minus1, self.hidden_size, self.hidden_size)?;
        let v = qkv.narrow(candle_core::D::Minus1, 2 * self.hidden_size, self.hidden_size)?;

        let q = self.split_heads(&q, b_sz, seq_len)?;
        let mut k = self.split_heads(&k, b_sz, seq_len)?;
        let mut v = self.split_heads(&v, b_sz, seq_len)?;

        let past_len = kv_cache.len()?;
        if let Some(ref k_cached) = kv_cache.k_cache {
            k = Tensor::cat(&[k_cached, &k], 2)?; // Concatenate on seq_len dimension
        }
        if let Some(ref v_cached) = kv_cache.v_cache {
            v = Tensor::cat(&[v_cached, &v], 2)?;
        }

        kv_cache.k_cache = Some(k.clone());
        kv_cache.v_cache = Some(v.clone());

        let scaling = 1.0 / (head_dim as f64).sqrt();
        let attn_scores = q.matmul(&k.t()?)?.affine(scaling, 0.0)?;

        // A single new token may attend to everything already cached.
        let attn_scores = if seq_len > 1 {
            let mask = Self::create_causal_mask(seq_len, past_len, &self.device)?
                .to_dtype(attn_scores.dtype())?;
            attn_scores.broadcast_add(&mask)?
        } else {
            attn_scores
        };

        let attn_probs = candle_nn::ops::softmax(&attn_scores, candle_core::D::Minus1)?;

        let context = attn_probs
            .matmul(&v)?
            .transpose(1, 2)? // (b_sz, seq_len, n_heads, head_dim)
            .reshape((b_sz, seq_len, self.hidden_size))?;

        self.c_proj.forward(&context)
    }
}

impl Layer for CausalSelfAttentionLayer {
    fn forward(&self, input: &Tensor) -> CandleResult<Tensor> {
        let mut cache = KVCache::new();
        self.forward_with_cache(input, &mut cache)
    }
}
