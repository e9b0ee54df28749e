use std::fs::File;

use anyhow::{anyhow, Context, Error};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use tokenizers::Tokenizer;

use crate::config::ModelConfig;
use crate::llm::artifacts::{ModelArtifacts, WeightsFile};
use crate::llm::device::ComputeBackend;
use crate::llm::inference::{self, SamplingParams};
use crate::llm::models::{Gpt2Model, Model};
use crate::llm::tokenizer::load_tokenizer;

/// Turns a prompt into a sampled continuation.
///
/// Implementations are shared across request tasks, so `generate` takes
/// `&self` and each call must be independent of every other call.
pub trait TextGenerator: Send + Sync {
    /// `max_length` bounds the total token count, prompt included.
    fn generate(&self, prompt: &str, max_length: usize) -> Result<String, Error>;
}

/// Tokenizer and GPT-2 weights loaded once for the process lifetime.
pub struct ModelHost {
    model: Gpt2Model,
    tokenizer: Tokenizer,
    device: Device,
    sampling: SamplingParams,
    seed: Option<u64>,
}

impl ModelHost {
    pub fn load(artifacts: &ModelArtifacts, backend: ComputeBackend, seed: Option<u64>) -> Result<Self, Error> {
        let device = backend
            .device()
            .with_context(|| format!("initializing compute backend {}", backend))?;

        let config: ModelConfig = serde_json::from_reader(
            File::open(&artifacts.config)
                .with_context(|| format!("opening {}", artifacts.config.display()))?,
        )
        .with_context(|| format!("parsing {}", artifacts.config.display()))?;

        tracing::info!(
            n_layer = config.n_layer,
            n_head = config.n_head,
            n_embd = config.n_embd,
            vocab_size = config.vocab_size,
            n_positions = config.n_positions,
            "model config loaded"
        );

        let vb = match &artifacts.weights {
            WeightsFile::Safetensors(path) => {
                tracing::info!("loading weights from {}", path.display());
                unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)? }
            }
            WeightsFile::Pytorch(path) => {
                tracing::info!("loading weights from {}", path.display());
                VarBuilder::from_pth(path, DType::F32, &device)?
            }
        };

        let model = Gpt2Model::new(&vb, &config, &device).context("building GPT-2 graph")?;
        let tokenizer = load_tokenizer(&artifacts.tokenizer)?;

        tracing::info!("model ready on {}", backend);

        Ok(Self::from_parts(model, tokenizer, device, seed))
    }

    pub fn from_parts(
        model: Gpt2Model,
        tokenizer: Tokenizer,
        device: Device,
        seed: Option<u64>,
    ) -> Self {
        Self {
            model,
            tokenizer,
            device,
            sampling: SamplingParams::default(),
            seed,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.model.cfg
    }

    fn encode(&self, prompt: &str) -> Result<Vec<u32>, Error> {
        let encoding = self.tokenizer.encode(prompt, true).map_err(|e| anyhow!(e))?;
        let mut ids = encoding.get_ids().to_vec();
        // Nothing to condition on: start from BOS.
        if ids.is_empty() {
            ids.push(self.model.cfg.bos_token_id);
        }
        Ok(ids)
    }
}

impl TextGenerator for ModelHost {
    fn generate(&self, prompt: &str, max_length: usize) -> Result<String, Error> {
        let prompt_ids = self.encode(prompt)?;

        let context = self.model.max_positions();
        let max_length = if max_length > context {
            tracing::warn!(
                requested = max_length,
                context,
                "max_length exceeds the model context, clamping"
            );
            context
        } else {
            max_length
        };

        let seed = self.seed.unwrap_or_else(rand::random);
        let mut sampler = self.sampling.logits_processor(seed);

        let output_ids = inference::generate(
            &prompt_ids,
            max_length,
            &self.model,
            &self.device,
            &mut sampler,
            self.model.cfg.eos_token_id,
        )?;

        tracing::debug!(
            prompt_tokens = prompt_ids.len(),
            total_tokens = output_ids.len(),
            "generation finished"
        );

        self.tokenizer
            .decode(&output_ids, true)
            .map_err(|e| anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{tiny_config, tiny_host, tiny_model_with_weights, tiny_tokenizer};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_config(dir: &Path, cfg: &ModelConfig) {
        let json = serde_json::json!({
            "model_type": "gpt2",
            "vocab_size": cfg.vocab_size,
            "n_positions": cfg.n_positions,
            "n_embd": cfg.n_embd,
            "n_layer": cfg.n_layer,
            "n_head": cfg.n_head,
            "activation_function": cfg.activation_function,
            "layer_norm_epsilon": cfg.layer_norm_epsilon,
            "bos_token_id": cfg.bos_token_id,
            "eos_token_id": cfg.eos_token_id,
        });
        std::fs::write(dir.join("config.json"), json.to_string()).unwrap();
    }

    /// Saves a tiny model in the on-disk layout `load` expects and returns
    /// the in-memory model it was saved from.
    fn write_artifacts(dir: &Path, prefix: Option<&str>) -> Gpt2Model {
        let (model, varmap) = tiny_model_with_weights(prefix);
        varmap.save(dir.join("model.safetensors")).unwrap();
        write_config(dir, &tiny_config());
        tiny_tokenizer().save(dir.join("tokenizer.json"), false).unwrap();
        model
    }

    #[test]
    fn loads_weights_saved_under_the_transformer_prefix() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path(), Some("transformer"));

        let artifacts = ModelArtifacts::from_dir(dir.path()).unwrap();
        let host = ModelHost::load(&artifacts, ComputeBackend::Cpu, Some(3)).unwrap();

        assert_eq!(host.config().n_layer, 2);
        let text = host.generate("the cat sat", 10).unwrap();
        assert!(text.starts_with("the cat sat"), "got {:?}", text);
    }

    #[test]
    fn loaded_model_samples_like_the_saved_one() {
        let dir = tempdir().unwrap();
        let saved = write_artifacts(dir.path(), None);

        let artifacts = ModelArtifacts::from_dir(dir.path()).unwrap();
        let loaded = ModelHost::load(&artifacts, ComputeBackend::Cpu, Some(21)).unwrap();
        let in_memory = ModelHost::from_parts(saved, tiny_tokenizer(), Device::Cpu, Some(21));

        let text = loaded.generate("the cat sat", 12).unwrap();
        assert!(text.starts_with("the cat sat"), "got {:?}", text);
        assert_eq!(text, in_memory.generate("the cat sat", 12).unwrap());
    }

    #[test]
    fn malformed_config_fails_the_load() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path(), None);
        std::fs::write(dir.path().join("config.json"), "{\"n_layer\": \"twelve\"").unwrap();

        let artifacts = ModelArtifacts::from_dir(dir.path()).unwrap();
        let err = ModelHost::load(&artifacts, ComputeBackend::Cpu, None).err().unwrap();
        assert!(err.to_string().contains("config.json"), "got {}", err);
    }

    #[test]
    fn truncated_weights_fail_the_load() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path(), None);
        std::fs::write(dir.path().join("model.safetensors"), b"not a safetensors file").unwrap();

        let artifacts = ModelArtifacts::from_dir(dir.path()).unwrap();
        assert!(ModelHost::load(&artifacts, ComputeBackend::Cpu, None).is_err());
    }

    #[test]
    fn weights_shaped_for_another_config_fail_the_load() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path(), None);
        let wider = ModelConfig {
            n_embd: 32,
            ..tiny_config()
        };
        write_config(dir.path(), &wider);

        let artifacts = ModelArtifacts::from_dir(dir.path()).unwrap();
        let err = ModelHost::load(&artifacts, ComputeBackend::Cpu, None).err().unwrap();
        assert!(format!("{:#}", err).contains("building GPT-2 graph"), "got {:#}", err);
    }

    #[test]
    fn continuation_starts_with_the_prompt() {
        let host = tiny_host(Some(11));
        let text = host.generate("the cat sat", 10).unwrap();
        assert!(text.starts_with("the cat sat"), "got {:?}", text);
        assert!(text.split_whitespace().count() <= 10);
    }

    #[test]
    fn long_prompt_with_short_max_length_is_not_extended() {
        let host = tiny_host(None);
        let prompt = "the cat sat on the mat";
        let text = host.generate(prompt, 5).unwrap();
        assert_eq!(text, prompt);
        assert!(text.len() <= prompt.len());
    }

    #[test]
    fn zero_max_length_returns_the_prompt() {
        let host = tiny_host(None);
        assert_eq!(host.generate("a dog ran", 0).unwrap(), "a dog ran");
    }

    #[test]
    fn empty_prompt_is_seeded_with_bos_and_decoded_without_it() {
        let host = tiny_host(Some(5));
        let text = host.generate("", 6).unwrap();
        assert!(!text.contains("<|endoftext|>"));
        assert!(text.split_whitespace().count() <= 5);
    }

    #[test]
    fn max_length_is_clamped_to_the_context() {
        let host = tiny_host(Some(1));
        let text = host.generate("hello", 10_000).unwrap();
        assert!(text.split_whitespace().count() <= host.config().n_positions);
    }

    #[test]
    fn fixed_seed_makes_calls_reproducible() {
        let host = tiny_host(Some(99));
        let first = host.generate("hello world", 12).unwrap();
        let second = host.generate("hello world", 12).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_calls_keep_their_own_prompt() {
        let host = Arc::new(tiny_host(None));
        let prompts = ["hello world", "the dog", "a cat sat", "on the mat"];

        let handles: Vec<_> = prompts
            .iter()
            .map(|prompt| {
                let host = Arc::clone(&host);
                let prompt = prompt.to_string();
                std::thread::spawn(move || (prompt.clone(), host.generate(&prompt, 12).unwrap()))
            })
            .collect();

        for handle in handles {
            let (prompt, text) = handle.join().unwrap();
            assert!(text.starts_with(&prompt), "{:?} -> {:?}", prompt, text);
        }
    }

    #[test]
    fn tiny_tokenizer_strips_special_tokens() {
        let tokenizer = tiny_tokenizer();
        assert_eq!(tokenizer.decode(&[0, 2, 3], true).unwrap(), "hello world");
    }
}
