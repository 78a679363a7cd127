use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::assistant::error::Result;
use crate::assistant::search::{SearchNormalizer, SearchProvider};
use crate::assistant::{Assistant, CodeExecutor, OllamaClient, ResponsePipeline, Workspace};
use crate::server::rest::{create_router, AppState};
use crate::shared::config::{AfterImplicitWrite, OllamaConfig, ServerConfig, WorkspaceConfig};
use crate::shared::models::SearchResult;

struct EchoProvider;

#[async_trait]
impl SearchProvider for EchoProvider {
    fn name(&self) -> String {
        "echo".to_string()
    }

    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchResult>> {
        Ok(vec![SearchResult {
            title: format!("Result for {query}"),
            snippet: "snippet".to_string(),
            url: "https://example.com/r".to_string(),
        }])
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Fake Ollama: `{prompt}` in the reply is replaced by the prompt it received.
async fn fake_model(reply: &'static str) -> String {
    let app = Router::new()
        .route(
            "/api/generate",
            post(move |Json(body): Json<serde_json::Value>| async move {
                let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
                Json(serde_json::json!({ "response": reply.replace("{prompt}", &prompt) }))
            }),
        )
        .route(
            "/api/tags",
            get(|| async { Json(serde_json::json!({ "models": [{ "name": "test:latest" }] })) }),
        );
    serve(app).await
}

pub(crate) struct TestServer {
    pub base: String,
    pub dir: tempfile::TempDir,
    client: reqwest::Client,
}

impl TestServer {
    pub async fn start(reply: &'static str, tools_enabled: bool) -> Self {
        let model_host = fake_model(reply).await;
        Self::with_model_host(&model_host, tools_enabled).await
    }

    pub async fn with_model_host(model_host: &str, tools_enabled: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("public");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<h1>codeassist</h1>").unwrap();

        let workspace = Workspace::open(&dir.path().join("workspace")).unwrap();
        let ollama = OllamaClient::new(&OllamaConfig {
            host: model_host.to_string(),
            model: "test".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        let search = Arc::new(SearchNormalizer::new(
            vec![Box::new(EchoProvider)],
            Duration::from_secs(1),
            5,
        ));
        let runner = Arc::new(CodeExecutor::new(workspace.clone(), &WorkspaceConfig::default()));
        let pipeline =
            ResponsePipeline::new(workspace, runner, search.clone(), AfterImplicitWrite::Stop);
        let assistant = Assistant::with_parts(ollama, search, pipeline);

        let config = ServerConfig {
            static_dir,
            tools_enabled,
            ..ServerConfig::default()
        };
        let base = serve(create_router(Arc::new(AppState::new(assistant, config)))).await;

        Self {
            base,
            dir,
            client: reqwest::Client::new(),
        }
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap()
    }
}
