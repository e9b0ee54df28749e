use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::{AddedToken, Tokenizer};

pub const END_OF_TEXT: &str = "<|endoftext|>";

/// On-disk tokenizer layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerFiles {
    /// A serialized `tokenizers` pipeline.
    Json(PathBuf),
    /// The `vocab.json` + `merges.txt` pair written by the slow GPT-2 tokenizer.
    VocabMerges { vocab: PathBuf, merges: PathBuf },
}

impl TokenizerFiles {
    /// `tokenizer.json` wins when both layouts are present.
    pub fn find_in(dir: &Path) -> Option<Self> {
        let json = dir.join("tokenizer.json");
        if json.is_file() {
            return Some(TokenizerFiles::Json(json));
        }
        let vocab = dir.join("vocab.json");
        let merges = dir.join("merges.txt");
        if vocab.is_file() && merges.is_file() {
            return Some(TokenizerFiles::VocabMerges { vocab, merges });
        }
        None
    }
}

pub fn load_tokenizer(files: &TokenizerFiles) -> Result<Tokenizer, Error> {
    match files {
        TokenizerFiles::Json(path) => Tokenizer::from_file(path)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("loading tokenizer from {}", path.display())),
        TokenizerFiles::VocabMerges { vocab, merges } => {
            byte_level_bpe(vocab, merges).with_context(|| {
                format!(
                    "building tokenizer from {} and {}",
                    vocab.display(),
                    merges.display()
                )
            })
        }
    }
}

fn byte_level_bpe(vocab: &Path, merges: &Path) -> Result<Tokenizer, Error> {
    let vocab = vocab.to_str().ok_or_else(|| anyhow!("non UTF-8 vocab path"))?;
    let merges = merges.to_str().ok_or_else(|| anyhow!("non UTF-8 merges path"))?;

    let bpe = BPE::from_file(vocab, merges).build().map_err(|e| anyhow!(e))?;

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer
        .with_pre_tokenizer(Some(ByteLevel::new(false, true, true)))
        .with_decoder(Some(ByteLevel::default()));
    tokenizer.add_special_tokens(&[AddedToken::from(END_OF_TEXT, true)]);

    Ok(tokenizer)
}
