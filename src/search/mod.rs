//! Web search capability backed by the Exa search API.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

const MAX_CHARACTERS: usize = 1000;

/// Errors raised by web search providers.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP layer failed before receiving a response.
    #[error("Web search request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an error status.
    #[error("Web search rejected ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: reqwest::StatusCode,
        /// Response body describing the failure.
        body: String,
    },
}

/// One web page returned by a search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebResult {
    /// Page title, when the provider has one.
    #[serde(default)]
    pub title: Option<String>,
    /// Page address.
    pub url: String,
    /// Extracted page text, truncated by the provider.
    #[serde(default)]
    pub text: Option<String>,
}

/// Interface implemented by web search backends.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run `query` and return the provider's top results.
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, SearchError>;
}

/// Exa `/search` client.
pub struct ExaClient {
    http: Client,
    base_url: String,
    api_key: String,
    num_results: usize,
}

impl ExaClient {
    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, SearchError> {
        let http = Client::builder()
            .user_agent("research-assistant/search")
            .build()?;
        Ok(Self {
            http,
            base_url: config.exa_base_url.clone(),
            api_key: config.exa_api_key.clone(),
            num_results: config.exa_num_results,
        })
    }
}

#[async_trait]
impl WebSearch for ExaClient {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, SearchError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let body = json!({
            "query": query,
            "numResults": self.num_results,
            "contents": { "text": { "maxCharacters": MAX_CHARACTERS } },
        });

        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Exa search failed");
            return Err(SearchError::Rejected { status, body });
        }

        let SearchResponse { results } = response.json().await?;
        tracing::debug!(results = results.len(), "Web search completed");
        Ok(results)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WebResult>,
}

/// Render results as a numbered plain-text list for an agent.
pub fn format_results(results: &[WebResult]) -> String {
    if results.is_empty() {
        return "No web results found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            let title = result.title.as_deref().unwrap_or("Untitled");
            let text = result.text.as_deref().unwrap_or("").trim();
            format!("{}. {title} ({})\n{text}", index + 1, result.url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
