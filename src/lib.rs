//! GPT-2 text generation over HTTP.
//!
//! [`llm::ModelHost`] owns the tokenizer and weights for the process lifetime;
//! [`api`] validates requests and forwards them to it.

pub mod api;
pub mod app_state;
pub mod config;
pub mod llm;

pub use app_state::AppState;
pub use config::{ModelConfig, ServerConfig};
