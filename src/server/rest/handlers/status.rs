use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::server::rest::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ollama = state.assistant.ollama();
    match ollama.list_models().await {
        Ok(models) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "models": models,
                "currentModel": ollama.model(),
            })),
        ),
        Err(e) => {
            warn!("Ollama status check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Ollama is not available. Make sure it is running.",
                })),
            )
        }
    }
}
