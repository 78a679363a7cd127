use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::error::{AssistantError, Result};
use crate::shared::config::{SearchConfig, MAX_SEARCH_RESULTS};
use crate::shared::models::SearchResult;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const MAX_SNIPPET_CHARS: usize = 400;
const MAX_TOPIC_TITLE_CHARS: usize = 100;
const UNTITLED: &str = "Untitled";

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> String;

    /// Raw provider results. Normalization happens in [`SearchNormalizer`].
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

async fn get_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T> {
    let resp = request
        .send()
        .await
        .map_err(|e| AssistantError::provider(provider, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AssistantError::provider(provider, format!("HTTP {status}")));
    }
    resp.json::<T>()
        .await
        .map_err(|e| AssistantError::provider(provider, e))
}

#[derive(Debug, Clone)]
pub struct SerpApiProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    organic_results: Option<Vec<SerpApiResult>>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    title: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

impl SerpApiProvider {
    pub fn new(client: reqwest::Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> String {
        "serpapi".to_string()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let req = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("api_key", self.api_key.as_str()),
            ("engine", "google"),
            ("num", max_results.to_string().as_str()),
        ]);
        let parsed: SerpApiResponse = get_json("serpapi", req).await?;

        let mut out = Vec::new();
        for r in parsed.organic_results.unwrap_or_default() {
            let Some(url) = r.link else { continue };
            out.push(SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.snippet.unwrap_or_default(),
                url,
            });
        }
        Ok(out)
    }
}

/// One public SearXNG instance. The normalizer holds one of these per
/// configured instance so each gets its own timeout.
#[derive(Debug, Clone)]
pub struct SearxngProvider {
    client: reqwest::Client,
    instance: String,
    language: String,
    time_range: String,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    title: Option<String>,
    content: Option<String>,
    url: Option<String>,
}

impl SearxngProvider {
    pub fn new(client: reqwest::Client, instance: &str, language: &str, time_range: &str) -> Self {
        Self {
            client,
            instance: instance.trim().trim_end_matches('/').to_string(),
            language: language.to_string(),
            time_range: time_range.to_string(),
        }
    }

    fn search_endpoint(&self) -> String {
        if self.instance.ends_with("/search") {
            self.instance.clone()
        } else {
            format!("{}/search", self.instance)
        }
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> String {
        format!("searxng({})", self.instance)
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let req = self
            .client
            .get(self.search_endpoint())
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("language", self.language.as_str()),
                ("time_range", self.time_range.as_str()),
            ]);
        let parsed: SearxngResponse = get_json(&self.name(), req).await?;

        let mut out = Vec::new();
        for r in parsed.results.unwrap_or_default().into_iter().take(max_results) {
            let Some(url) = r.url else { continue };
            out.push(SearchResult {
                title: r.title.unwrap_or_default(),
                snippet: r.content.unwrap_or_default(),
                url,
            });
        }
        Ok(out)
    }
}

/// DuckDuckGo Instant Answer API. Needs no key, returns an abstract plus a
/// handful of related topics.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default, rename = "Abstract")]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

// Grouped topics carry `Name`/`Topics` instead of `Text`/`FirstURL` and are skipped
#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> String {
        "duckduckgo".to_string()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let req = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
        ]);
        let parsed: InstantAnswer = get_json("duckduckgo", req).await?;

        let mut out = Vec::new();
        if !parsed.abstract_text.trim().is_empty() {
            let title = if parsed.heading.trim().is_empty() {
                "DuckDuckGo result".to_string()
            } else {
                parsed.heading
            };
            out.push(SearchResult {
                title,
                snippet: parsed.abstract_text,
                url: parsed.abstract_url,
            });
        }
        for topic in parsed.related_topics.into_iter().take(4) {
            let (Some(text), Some(url)) = (topic.text, topic.first_url) else {
                continue;
            };
            if text.is_empty() || url.is_empty() {
                continue;
            }
            out.push(SearchResult {
                title: truncate_chars(&text, MAX_TOPIC_TITLE_CHARS),
                snippet: text,
                url,
            });
        }
        out.truncate(max_results);
        Ok(out)
    }
}

/// Tries providers in order and returns the first non-empty, normalized list.
/// Never fails: if every provider errors, times out or comes back empty the
/// result is an empty list.
pub struct SearchNormalizer {
    providers: Vec<Box<dyn SearchProvider>>,
    timeout: Duration,
    max_results: usize,
}

impl SearchNormalizer {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, timeout: Duration, max_results: usize) -> Self {
        Self {
            providers,
            timeout,
            max_results: max_results.clamp(1, MAX_SEARCH_RESULTS),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AssistantError::Config(format!("failed to build HTTP client: {e}")))?;

        let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();
        if let Some(key) = config.serpapi_key.as_deref() {
            providers.push(Box::new(SerpApiProvider::new(
                client.clone(),
                &config.serpapi_endpoint,
                key,
            )));
        }
        for instance in &config.searxng_instances {
            providers.push(Box::new(SearxngProvider::new(
                client.clone(),
                instance,
                &config.language,
                &config.time_range,
            )));
        }
        providers.push(Box::new(DuckDuckGoProvider::new(
            client,
            &config.duckduckgo_endpoint,
        )));

        Ok(Self::new(
            providers,
            Duration::from_secs(config.provider_timeout_secs),
            config.max_results,
        ))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let start = Instant::now();
        info!(tool = "search_web", %query, "tool start");

        for provider in &self.providers {
            let name = provider.name();
            let outcome = tokio::time::timeout(self.timeout, provider.search(query, self.max_results)).await;
            let results = match outcome {
                Ok(Ok(results)) => results,
                Ok(Err(err)) => {
                    warn!("{}, trying next provider", err);
                    continue;
                }
                Err(_) => {
                    warn!(provider = %name, "search provider timed out after {:?}, trying next provider", self.timeout);
                    continue;
                }
            };
            if results.is_empty() {
                warn!(provider = %name, "search provider returned no results, trying next provider");
                continue;
            }

            let normalized = normalize(results, self.max_results);
            info!(
                tool = "search_web",
                provider = %name,
                results = normalized.len(),
                took_ms = start.elapsed().as_millis() as u64,
                "tool end"
            );
            return normalized;
        }

        warn!(tool = "search_web", %query, "no search provider returned results");
        Vec::new()
    }
}

fn normalize(results: Vec<SearchResult>, max_results: usize) -> Vec<SearchResult> {
    results
        .into_iter()
        .take(max_results)
        .map(|r| {
            let mut title = r.title.trim().to_string();
            if title.is_empty() {
                title = UNTITLED.to_string();
            }
            let mut snippet = r.snippet.trim().to_string();
            if snippet.is_empty() {
                snippet = title.clone();
            }
            SearchResult {
                snippet: truncate_chars(&snippet, MAX_SNIPPET_CHARS),
                title,
                url: r.url.trim().to_string(),
            }
        })
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
