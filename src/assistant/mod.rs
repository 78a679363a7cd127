pub mod catalog;
pub mod error;
pub mod executor;
pub mod intent;
pub mod ollama;
pub mod pipeline;
pub mod search;
pub mod tags;
pub mod workspace;

use std::sync::Arc;

use tracing::info;

pub use catalog::ToolCatalog;
pub use error::{AssistantError, Result};
pub use executor::{CodeExecutor, CodeRunner, Language};
pub use ollama::{ModelTag, OllamaClient};
pub use pipeline::{ProcessedResponse, ResponsePipeline};
pub use search::SearchNormalizer;
pub use workspace::Workspace;

use crate::shared::config::{AssistantConfig, GenerationOptions};

/// Everything one conversational turn needs: the model, web search, and the
/// pipeline that acts on tool tags in the model's reply.
pub struct Assistant {
    ollama: OllamaClient,
    search: Arc<SearchNormalizer>,
    pipeline: ResponsePipeline,
    system_prompt: String,
}

impl Assistant {
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let workspace = Workspace::open(&config.workspace.dir)?;
        info!("Workspace ready at {}", workspace.root().display());

        let ollama = OllamaClient::new(&config.ollama)?;
        let search = Arc::new(SearchNormalizer::from_config(&config.search)?);
        let runner: Arc<dyn CodeRunner> =
            Arc::new(CodeExecutor::new(workspace.clone(), &config.workspace));
        let pipeline = ResponsePipeline::new(
            workspace,
            runner,
            search.clone(),
            config.pipeline.after_implicit_write,
        );

        Ok(Self::with_parts(ollama, search, pipeline))
    }

    pub fn with_parts(
        ollama: OllamaClient,
        search: Arc<SearchNormalizer>,
        pipeline: ResponsePipeline,
    ) -> Self {
        let system_prompt = ToolCatalog::system_prompt(pipeline.workspace().root());
        Self {
            ollama,
            search,
            pipeline,
            system_prompt,
        }
    }

    pub fn ollama(&self) -> &OllamaClient {
        &self.ollama
    }

    pub fn search(&self) -> &SearchNormalizer {
        &self.search
    }

    pub fn pipeline(&self) -> &ResponsePipeline {
        &self.pipeline
    }

    pub fn workspace(&self) -> &Workspace {
        self.pipeline.workspace()
    }

    /// Queries the model with the tool catalog and runs the reply through the
    /// pipeline. Only `Connectivity` errors come back out.
    pub async fn run_turn(
        &self,
        input: &str,
        options: &GenerationOptions,
    ) -> Result<ProcessedResponse> {
        let raw = self
            .ollama
            .generate(input, Some(&self.system_prompt), options)
            .await?;
        let processed = self.pipeline.process(&raw, input).await;
        info!(
            tools_invoked = processed.tools_invoked,
            display_len = processed.display_text.len(),
            "turn complete"
        );
        Ok(processed)
    }
}
