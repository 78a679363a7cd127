pub mod rest;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::assistant::Assistant;
use crate::shared::config::AssistantConfig;
use rest::{create_router, AppState};

pub async fn run_server(config: AssistantConfig) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Shutting down codeassist server...");
        std::process::exit(0);
    })?;

    info!("Starting codeassist HTTP service (PID {})", std::process::id());

    let assistant = Assistant::from_config(&config)?;
    let server_config = config.server.clone();
    let bind_addr = format!("{}:{}", server_config.host, server_config.port);

    info!("Ollama host: {}", assistant.ollama().base_url());
    info!("Model: {}", assistant.ollama().model());
    info!(
        "Search providers: {}",
        assistant.search().provider_names().join(", ")
    );
    info!(
        "Tool tags in chat replies: {}",
        if server_config.tools_enabled { "enabled" } else { "disabled" }
    );

    let state = Arc::new(AppState::new(assistant, server_config));
    let app = create_router(state);

    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
