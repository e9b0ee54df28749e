use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Error};
use hf_hub::api::sync::{Api, ApiError};

use crate::llm::tokenizer::TokenizerFiles;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsFile {
    Safetensors(PathBuf),
    /// Pickled `pytorch_model.bin`, for checkpoints saved without safetensors.
    Pytorch(PathBuf),
}

/// Files making up a pretrained checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub config: PathBuf,
    pub weights: WeightsFile,
    pub tokenizer: TokenizerFiles,
}

impl ModelArtifacts {
    /// Resolves a `save_pretrained` style directory.
    pub fn from_dir(dir: &Path) -> Result<Self, Error> {
        if !dir.is_dir() {
            bail!("model directory {} does not exist", dir.display());
        }

        let config = dir.join("config.json");
        if !config.is_file() {
            bail!("{} is missing config.json", dir.display());
        }

        let safetensors = dir.join("model.safetensors");
        let pytorch = dir.join("pytorch_model.bin");
        let weights = if safetensors.is_file() {
            WeightsFile::Safetensors(safetensors)
        } else if pytorch.is_file() {
            WeightsFile::Pytorch(pytorch)
        } else {
            bail!(
                "{} has neither model.safetensors nor pytorch_model.bin",
                dir.display()
            );
        };

        let tokenizer = TokenizerFiles::find_in(dir).ok_or_else(|| {
            anyhow!(
                "{} has neither tokenizer.json nor vocab.json + merges.txt",
                dir.display()
            )
        })?;

        Ok(Self {
            config,
            weights,
            tokenizer,
        })
    }

    /// Downloads (or reuses the local cache of) a Hugging Face Hub repo.
    pub fn from_hub(repo_id: &str) -> Result<Self, Error> {
        let api = Api::new()?;
        let repo = api.model(repo_id.to_string());

        let config = repo
            .get("config.json")
            .with_context(|| format!("fetching config.json from {}", repo_id))?;

        let weights = first_available(
            ("model.safetensors", || repo.get("model.safetensors").map(WeightsFile::Safetensors)),
            ("pytorch_model.bin", || repo.get("pytorch_model.bin").map(WeightsFile::Pytorch)),
        )
        .with_context(|| format!("fetching weights from {}", repo_id))?;

        let tokenizer = first_available(
            ("tokenizer.json", || repo.get("tokenizer.json").map(TokenizerFiles::Json)),
            ("vocab.json + merges.txt", || -> Result<_, ApiError> {
                Ok(TokenizerFiles::VocabMerges {
                    vocab: repo.get("vocab.json")?,
                    merges: repo.get("merges.txt")?,
                })
            }),
        )
        .with_context(|| format!("fetching tokenizer from {}", repo_id))?;

        Ok(Self {
            config,
            weights,
            tokenizer,
        })
    }
}

/// Tries `primary`, then `fallback`. When both fail the error keeps both
/// causes, so a network or auth failure on the first file stays visible.
fn first_available<T, E: fmt::Display>(
    (primary_name, primary): (&str, impl FnOnce() -> Result<T, E>),
    (fallback_name, fallback): (&str, impl FnOnce() -> Result<T, E>),
) -> Result<T, Error> {
    let primary_err = match primary() {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    tracing::warn!("{} unavailable ({}), trying {}", primary_name, primary_err, fallback_name);

    fallback().map_err(|fallback_err| {
        anyhow!(
            "{}: {}; {}: {}",
            primary_name,
            primary_err,
            fallback_name,
            fallback_err
        )
    })
}
