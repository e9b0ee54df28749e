use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::cors::CorsPolicy;
use crate::api::handlers::{generate, root};
use crate::AppState;

pub fn create_router(state: Arc<AppState>, cors: &CorsPolicy) -> Result<Router> {
    let router = Router::new()
        .route("/", get(root))
        .route("/generate", post(generate));

    Ok(cors
        .apply(router)?
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Binds `addr` and serves `app` until the process is stopped.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /         - Liveness probe");
    tracing::info!("  POST /generate - Text generation");

    axum::serve(listener, app).await?;

    Ok(())
}
