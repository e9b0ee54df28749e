//! Model host: GPT-2 graph on candle, tokenizer, artifact loading and sampling.

pub mod activation;
pub mod artifacts;
pub mod causal_self_attention;
pub mod decoder;
pub mod device;
pub mod embedding;
pub mod host;
pub mod inference;
pub mod layer;
pub mod layer_norm;
pub mod linear;
pub mod lm_head;
pub mod mlp;
pub mod models;
pub mod tokenizer;

pub use host::{ModelHost, TextGenerator};

#[cfg(test)]
pub(crate) mod test_support {
    use std::str::FromStr;

    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};
    use tokenizers::Tokenizer;

    use crate::config::ModelConfig;
    use crate::llm::host::ModelHost;
    use crate::llm::models::Gpt2Model;

    const WORDS: [&str; 16] = [
        "<|endoftext|>",
        "unk",
        "hello",
        "world",
        "the",
        "cat",
        "sat",
        "on",
        "mat",
        "a",
        "dog",
        "ran",
        "and",
        "then",
        "slept",
        "home",
    ];

    pub fn tiny_config() -> ModelConfig {
        ModelConfig {
            vocab_size: WORDS.len(),
            n_positions: 32,
            n_embd: 16,
            n_layer: 2,
            n_head: 2,
            n_inner: None,
            activation_function: "gelu_new".to_string(),
            layer_norm_epsilon: 1e-5,
            bos_token_id: 0,
            eos_token_id: 0,
        }
    }

    /// Randomly initialized GPT-2 with the `tiny_config` shape.
    pub fn tiny_model() -> Gpt2Model {
        tiny_model_with_weights(None).0
    }

    /// Like `tiny_model`, also handing back the weights so they can be saved.
    /// With a `prefix` every tensor name starts with `{prefix}.`.
    pub fn tiny_model_with_weights(prefix: Option<&str>) -> (Gpt2Model, VarMap) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let vb = match prefix {
            Some(prefix) => vb.pp(prefix),
            None => vb,
        };
        let model = Gpt2Model::new(&vb, &tiny_config(), &Device::Cpu).unwrap();
        (model, varmap)
    }

    /// Whitespace word-level tokenizer over `WORDS`, `<|endoftext|>` special.
    pub fn tiny_tokenizer() -> Tokenizer {
        let vocab = WORDS
            .iter()
            .enumerate()
            .map(|(id, word)| format!("\"{}\": {}", word, id))
            .collect::<Vec<_>>()
            .join(", ");

        let json = format!(
            r#"{{
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [
                    {{"id": 0, "content": "<|endoftext|>", "single_word": false, "lstrip": false,
                      "rstrip": false, "normalized": false, "special": true}}
                ],
                "normalizer": null,
                "pre_tokenizer": {{"type": "Whitespace"}},
                "post_processor": null,
                "decoder": null,
                "model": {{"type": "WordLevel", "vocab": {{{}}}, "unk_token": "unk"}}
            }}"#,
            vocab
        );

        Tokenizer::from_str(&json).unwrap()
    }

    pub fn tiny_host(seed: Option<u64>) -> ModelHost {
        ModelHost::from_parts(tiny_model(), tiny_tokenizer(), Device::Cpu, seed)
    }
}
