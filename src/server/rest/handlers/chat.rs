use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assistant::{tags, ToolCatalog};
use crate::server::rest::error::{ApiError, ApiResult};
use crate::server::rest::AppState;
use crate::shared::models::SearchResult;

fn default_use_search() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_use_search")]
    pub use_search: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub search_results: Option<Vec<SearchResult>>,
    pub used_search: bool,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("message is required".to_string()))?;

    let preview: String = message.chars().take(100).collect();
    info!(use_search = req.use_search, "chat request: {}", preview);

    let results = if req.use_search {
        state.assistant.search().search(message).await
    } else {
        Vec::new()
    };

    let prompt = format!("{}{}", message, ToolCatalog::search_context(&results));
    let raw = state
        .assistant
        .ollama()
        .generate(
            &prompt,
            Some(ToolCatalog::conversational_prompt()),
            &state.config.options,
        )
        .await?;

    let response = if state.config.tools_enabled {
        state
            .assistant
            .pipeline()
            .process(&raw, message)
            .await
            .display_text
    } else {
        tags::strip_thinking(&raw)
    };

    let used_search = !results.is_empty();
    Ok(Json(ChatResponse {
        response,
        search_results: if used_search { Some(results) } else { None },
        used_search,
    }))
}

#[cfg(test)]
mod tests {
    use crate::server::rest::handlers::testing::TestServer;

    #[tokio::test]
    async fn chat_with_search_grounds_the_prompt() {
        let server = TestServer::start("<think>hidden</think>You asked: {prompt}", false).await;
        let resp = server
            .post("/api/chat", serde_json::json!({ "message": "what is axum?" }))
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();

        let response = body["response"].as_str().unwrap();
        assert!(response.starts_with("You asked: what is axum?"));
        assert!(response.contains("[1] Result for what is axum?\nsnippet\nURL: https://example.com/r"));
        assert_eq!(body["usedSearch"], true);
        assert_eq!(body["searchResults"][0]["url"], "https://example.com/r");
    }

    #[tokio::test]
    async fn chat_without_search_has_null_results() {
        let server = TestServer::start("plain", false).await;
        let resp = server
            .post("/api/chat", serde_json::json!({ "message": "hi", "useSearch": false }))
            .await;
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["response"], "plain");
        assert_eq!(body["usedSearch"], false);
        assert!(body["searchResults"].is_null());
    }

    #[tokio::test]
    async fn tags_are_left_alone_unless_tools_are_enabled() {
        let reply = "[WRITE_FILE:note.txt]\nhi\n[/WRITE_FILE]";

        let server = TestServer::start(reply, false).await;
        let body: serde_json::Value = server
            .post("/api/chat", serde_json::json!({ "message": "note", "useSearch": false }))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["response"], reply);
        assert!(!server.dir.path().join("workspace/note.txt").exists());

        let server = TestServer::start(reply, true).await;
        let body: serde_json::Value = server
            .post("/api/chat", serde_json::json!({ "message": "note", "useSearch": false }))
            .await
            .json()
            .await
            .unwrap();
        assert!(body["response"].as_str().unwrap().contains("File saved to: "));
        assert!(server.dir.path().join("workspace/note.txt").exists());
    }

    #[tokio::test]
    async fn missing_message_is_bad_request() {
        let server = TestServer::start("unused", false).await;
        let resp = server.post("/api/chat", serde_json::json!({})).await;
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn unreachable_model_is_bad_gateway() {
        let server = TestServer::with_model_host("http://127.0.0.1:9", false).await;
        let resp = server
            .post("/api/chat", serde_json::json!({ "message": "hi", "useSearch": false }))
            .await;
        assert_eq!(resp.status(), 502);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("could not reach inference endpoint"));
    }
}
