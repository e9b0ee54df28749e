use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::api::cors::CorsPolicy;
use crate::llm::device::DevicePreference;

/// Subset of a Hugging Face GPT-2 `config.json` needed to build the graph.
///
/// Missing fields fall back to the GPT-2 small (124M) values.
#[derive(Deserialize, Debug, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default = "default_n_embd")]
    pub n_embd: usize,
    #[serde(default = "default_n_layer")]
    pub n_layer: usize,
    #[serde(default = "default_n_head")]
    pub n_head: usize,
    /// Width of the MLP hidden layer, `4 * n_embd` when absent.
    #[serde(default)]
    pub n_inner: Option<usize>,
    #[serde(default = "default_activation")]
    pub activation_function: String,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_special_token_id")]
    pub bos_token_id: u32,
    #[serde(default = "default_special_token_id")]
    pub eos_token_id: u32,
}

fn default_vocab_size() -> usize {
    50257
}

fn default_n_positions() -> usize {
    1024
}

fn default_n_embd() -> usize {
    768
}

fn default_n_layer() -> usize {
    12
}

fn default_n_head() -> usize {
    12
}

fn default_activation() -> String {
    "gelu_new".to_string()
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_special_token_id() -> u32 {
    50256
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
            n_positions: default_n_positions(),
            n_embd: default_n_embd(),
            n_layer: default_n_layer(),
            n_head: default_n_head(),
            n_inner: None,
            activation_function: default_activation(),
            layer_norm_epsilon: default_layer_norm_epsilon(),
            bos_token_id: default_special_token_id(),
            eos_token_id: default_special_token_id(),
        }
    }
}

impl ModelConfig {
    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    pub fn inner_dim(&self) -> usize {
        self.n_inner.unwrap_or(4 * self.n_embd)
    }
}

/// Process configuration, read from flags or the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "gpt2_serve", version, about = "GPT-2 text generation over HTTP")]
pub struct ServerConfig {
    /// Directory holding config.json, the weights and the tokenizer files
    #[arg(long, env = "GPT2_MODEL_PATH", default_value = "output_dir")]
    pub model_path: PathBuf,

    /// Fetch the artifacts from this Hugging Face Hub repo instead of `model_path`
    #[arg(long, env = "GPT2_HF_REPO")]
    pub hf_repo: Option<String>,

    #[arg(long, env = "GPT2_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "GPT2_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Compute device: auto, cpu, cuda or metal
    #[arg(long, env = "GPT2_DEVICE", value_enum, default_value_t = DevicePreference::Auto)]
    pub device: DevicePreference,

    /// Comma separated allow-list of origins; empty allows every origin
    #[arg(long, env = "GPT2_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Base seed for sampling; a fresh random seed per request when unset
    #[arg(long, env = "GPT2_SEED")]
    pub seed: Option<u64>,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cors_policy(&self) -> CorsPolicy {
        CorsPolicy::from_origins(&self.cors_origins)
    }
}
