use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[path = "../assistant/mod.rs"]
mod assistant;
#[path = "mod.rs"]
mod server;
#[path = "../shared/mod.rs"]
mod shared;

use shared::config::{AssistantConfig, Overrides};

#[derive(Parser)]
#[command(name = "codeassist-server")]
#[command(about = "HTTP chat and search API in front of a local Ollama model")]
struct Args {
    /// Config file (defaults to CODEASSIST_CONFIG_PATH or ~/.codeassist/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Listen port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    /// Model name
    #[arg(long, env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// SerpAPI key for keyed web search
    #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
    serpapi_key: Option<String>,

    /// Workspace for tool calls (only used when tools are enabled)
    #[arg(long, env = "WORKSPACE_DIR")]
    workspace: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => AssistantConfig::load_from_path(path)?,
        None => AssistantConfig::load_default()?.0,
    };
    config.apply_overrides(Overrides {
        ollama_host: args.ollama_host,
        ollama_model: args.model,
        serpapi_key: args.serpapi_key,
        workspace_dir: args.workspace,
        server_host: args.host,
        server_port: args.port,
    })?;

    // Initialize service logging
    let _ = shared::logging::init_service_logging(&config.server.log_dir, "codeassist_server");

    server::run_server(config).await
}
