use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gpt2_serve::api::cors::CorsPolicy;
use gpt2_serve::llm::artifacts::ModelArtifacts;
use gpt2_serve::llm::device::ComputeBackend;
use gpt2_serve::llm::ModelHost;
use gpt2_serve::{api, AppState, ServerConfig};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpt2_serve=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();

    let artifacts = match &config.hf_repo {
        Some(repo) => {
            tracing::info!("fetching model from the Hugging Face Hub: {}", repo);
            ModelArtifacts::from_hub(repo)?
        }
        None => ModelArtifacts::from_dir(&config.model_path)?,
    };
    tracing::debug!(?artifacts, "resolved model artifacts");

    let backend = ComputeBackend::detect(config.device);
    tracing::info!("compute backend: {}", backend);

    // Loaded before the runtime starts, so no request can see a partial model.
    let host = ModelHost::load(&artifacts, backend, config.seed)?;
    let state = Arc::new(AppState::new(Arc::new(host)));

    let policy = config.cors_policy();
    if policy == CorsPolicy::AllowAll {
        tracing::warn!("CORS allows every origin with credentials; restrict it with --cors-origins for production");
    }
    let app = api::create_router(state, &policy)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(api::serve(&config.addr(), app))
}
