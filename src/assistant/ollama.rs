use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{AssistantError, Result};
use crate::shared::config::{GenerationOptions, OllamaConfig};

#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Entry of `GET /api/tags`. Fields other than `name` are passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelTag {
    pub name: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AssistantError::Config(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.host.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One non-streaming completion. Every failure, including an HTTP error
    /// status or an unreadable body, is reported as `Connectivity`.
    pub async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        options: &GenerationOptions,
    ) -> Result<String> {
        let req = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options,
        };

        let start = Instant::now();
        info!(model = %self.model, prompt_len = prompt.len(), "sending prompt to model");

        let url = format!("{}/api/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                warn!("Ollama request failed: {}", e);
                AssistantError::Connectivity(e.to_string())
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response>".to_string());
            warn!("Ollama generate error ({}): {}", status, text);
            return Err(AssistantError::Connectivity(format!(
                "Ollama generate error ({}): {}",
                status, text
            )));
        }

        let parsed: GenerateResponse = resp.json().await.map_err(|e| {
            AssistantError::Connectivity(format!("Failed to parse Ollama response: {}", e))
        })?;

        info!(
            model = %self.model,
            response_len = parsed.response.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "model response received"
        );
        Ok(parsed.response)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelTag>> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AssistantError::Connectivity(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AssistantError::Connectivity(format!(
                "Ollama tags error ({})",
                resp.status()
            )));
        }

        let parsed: TagsResponse = resp.json().await.map_err(|e| {
            AssistantError::Connectivity(format!("Failed to parse Ollama tags: {}", e))
        })?;
        Ok(parsed.models)
    }

    /// True if the configured model appears in `models`, with or without the
    /// `:latest` suffix Ollama adds to untagged pulls.
    pub fn has_model(&self, models: &[ModelTag]) -> bool {
        models.iter().any(|m| {
            m.name == self.model
                || m.name.strip_suffix(":latest") == Some(self.model.as_str())
        })
    }
}
