use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const MAX_SEARCH_RESULTS: usize = 5;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssistantConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            timeout_secs: default_ollama_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub serpapi_key: Option<String>,
    #[serde(default = "default_serpapi_endpoint")]
    pub serpapi_endpoint: String,
    #[serde(default = "default_searxng_instances")]
    pub searxng_instances: Vec<String>,
    #[serde(default = "default_search_language")]
    pub language: String,
    #[serde(default = "default_time_range")]
    pub time_range: String,
    #[serde(default = "default_duckduckgo_endpoint")]
    pub duckduckgo_endpoint: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            serpapi_endpoint: default_serpapi_endpoint(),
            searxng_instances: default_searxng_instances(),
            language: default_search_language(),
            time_range: default_time_range(),
            duckduckgo_endpoint: default_duckduckgo_endpoint(),
            provider_timeout_secs: default_provider_timeout_secs(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    #[serde(default = "default_node_program")]
    pub node_program: String,
    #[serde(default = "default_python_program")]
    pub python_program: String,
    #[serde(default = "default_shell_program")]
    pub shell_program: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            exec_timeout_secs: default_exec_timeout_secs(),
            node_program: default_node_program(),
            python_program: default_python_program(),
            shell_program: default_shell_program(),
        }
    }
}

/// What happens to explicit tags once an implicit file write has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AfterImplicitWrite {
    /// The confirmation is the whole reply; tags in the same response are ignored.
    #[default]
    Stop,
    /// Tags are still dispatched and their results appended to the confirmation.
    ScanTags,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub after_implicit_write: AfterImplicitWrite,
}

/// Sampling options forwarded verbatim in the `options` object of `/api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl GenerationOptions {
    /// Short, near-deterministic completions for tool use.
    pub fn interactive() -> Self {
        Self {
            temperature: Some(0.3),
            num_predict: Some(800),
            top_k: None,
            top_p: Some(0.9),
            repeat_penalty: Some(1.1),
            stop: vec!["<think>".to_string(), "</think>".to_string()],
        }
    }

    pub fn conversational() -> Self {
        Self {
            temperature: Some(0.7),
            num_predict: Some(500),
            top_k: Some(40),
            top_p: Some(0.9),
            repeat_penalty: None,
            stop: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(default = "GenerationOptions::interactive")]
    pub options: GenerationOptions,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            options: GenerationOptions::interactive(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default)]
    pub tools_enabled: bool,
    #[serde(default = "GenerationOptions::conversational")]
    pub options: GenerationOptions,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            static_dir: default_static_dir(),
            tools_enabled: false,
            options: GenerationOptions::conversational(),
            log_dir: default_log_dir(),
        }
    }
}

/// Values supplied on the command line or through the environment. They win
/// over whatever the config file says.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ollama_host: Option<String>,
    pub ollama_model: Option<String>,
    pub serpapi_key: Option<String>,
    pub workspace_dir: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
}

impl AssistantConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config at {}: {}", path.display(), e))?;
        let mut config: AssistantConfig = serde_json::from_str(&data)
            .map_err(|e| anyhow!("Failed to parse config JSON at {}: {}", path.display(), e))?;
        config.normalize()?;
        Ok(config)
    }

    /// Loads the config file if there is one, otherwise starts from defaults.
    pub fn load_default() -> Result<(Self, Option<PathBuf>)> {
        let path = resolve_config_path();
        if !path.exists() {
            let mut config = Self::default();
            config.normalize()?;
            return Ok((config, None));
        }
        let config = Self::load_from_path(&path)?;
        Ok((config, Some(path)))
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) -> Result<()> {
        if let Some(host) = non_empty(overrides.ollama_host) {
            self.ollama.host = host;
        }
        if let Some(model) = non_empty(overrides.ollama_model) {
            self.ollama.model = model;
        }
        if let Some(key) = non_empty(overrides.serpapi_key) {
            self.search.serpapi_key = Some(key);
        }
        if let Some(dir) = overrides.workspace_dir {
            self.workspace.dir = dir;
        }
        if let Some(host) = non_empty(overrides.server_host) {
            self.server.host = host;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        self.normalize()
    }

    fn normalize(&mut self) -> Result<()> {
        self.ollama.host = normalize_host(&self.ollama.host)?;

        self.ollama.model = self.ollama.model.trim().to_string();
        if self.ollama.model.is_empty() {
            self.ollama.model = default_ollama_model();
        }

        self.search.serpapi_key = self
            .search
            .serpapi_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let mut instances: Vec<String> = Vec::new();
        for raw in &self.search.searxng_instances {
            let instance = raw.trim().trim_end_matches('/').to_string();
            if !instance.is_empty() && !instances.contains(&instance) {
                instances.push(instance);
            }
        }
        self.search.searxng_instances = instances;
        self.search.max_results = self.search.max_results.clamp(1, MAX_SEARCH_RESULTS);

        if self.workspace.exec_timeout_secs == 0 {
            self.workspace.exec_timeout_secs = default_exec_timeout_secs();
        }

        Ok(())
    }
}

/// Accepts hosts without a scheme (`127.0.0.1:11434`) and strips trailing slashes.
pub fn normalize_host(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(default_ollama_host());
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };
    url::Url::parse(&with_scheme)
        .map_err(|e| anyhow!("Invalid inference host '{}': {}", raw, e))?;
    Ok(with_scheme)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama2".to_string()
}

fn default_ollama_timeout_secs() -> u64 {
    120
}

fn default_serpapi_endpoint() -> String {
    "https://serpapi.com/search".to_string()
}

fn default_searxng_instances() -> Vec<String> {
    vec![
        "https://searx.be".to_string(),
        "https://search.bus-hit.me".to_string(),
        "https://searx.tiekoetter.com".to_string(),
    ]
}

fn default_search_language() -> String {
    "es".to_string()
}

fn default_time_range() -> String {
    "year".to_string()
}

fn default_duckduckgo_endpoint() -> String {
    "https://api.duckduckgo.com/".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    5
}

fn default_max_results() -> usize {
    MAX_SEARCH_RESULTS
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./workspace")
}

fn default_exec_timeout_secs() -> u64 {
    30
}

fn default_node_program() -> String {
    "node".to_string()
}

fn default_python_program() -> String {
    "python3".to_string()
}

fn default_shell_program() -> String {
    "sh".to_string()
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_log_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codeassist")
        .join("logs")
}

pub fn resolve_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("CODEASSIST_CONFIG_PATH") {
        return expand_path(path);
    }

    default_config_path()
}

fn expand_path(input: String) -> PathBuf {
    if let Some(stripped) = input.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    } else if let Some(stripped) = input.strip_prefix("~\\") {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(input)
}

fn default_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codeassist")
        .join("config.json")
}

fn home_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    } else {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}
