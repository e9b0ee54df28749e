use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::extract::JsonBody;
use crate::api::models::{GenerationRequest, GenerationResponse, RootResponse, ROOT_MESSAGE};
use crate::app_state::AppState;

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: ROOT_MESSAGE.to_string(),
    })
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    tracing::info!(
        prompt_chars = request.prompt.chars().count(),
        max_length = request.max_length,
        "generation request"
    );

    // A negative bound asks for nothing beyond the prompt.
    let max_length = usize::try_from(request.max_length).unwrap_or(0);
    let generator = Arc::clone(&state.generator);

    let generated_text =
        tokio::task::spawn_blocking(move || generator.generate(&request.prompt, max_length))
            .await
            .map_err(anyhow::Error::from)??;

    Ok(Json(GenerationResponse { generated_text }))
}
