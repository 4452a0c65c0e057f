//! Tools offered to the executor agent.
//!
//! Tool calls never fail from the model's point of view: every outcome, including bad
//! arguments and backend errors, is returned as text.

use crate::retrieval::DocumentRetriever;
use crate::search::{WebSearch, format_results};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// A function the model may call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool.
    fn name(&self) -> &str;

    /// Description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Execute the tool with decoded arguments.
    async fn call(&self, arguments: Value) -> String;
}

fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": description }
        },
        "required": ["query"]
    })
}

fn string_argument<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Searches the uploaded document bound to the request namespace.
pub struct DocumentTool {
    retriever: DocumentRetriever,
}

impl DocumentTool {
    /// Wrap a namespace-bound retriever.
    pub fn new(retriever: DocumentRetriever) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for DocumentTool {
    fn name(&self) -> &str {
        "document_tool"
    }

    fn description(&self) -> &str {
        "Searches for information in the user-provided document."
    }

    fn parameters(&self) -> Value {
        query_schema("What to look for in the document.")
    }

    async fn call(&self, arguments: Value) -> String {
        match string_argument(&arguments, "query") {
            Some(query) => self.retriever.retrieve(query).await,
            None => "Error retrieving from document: missing `query` argument".to_string(),
        }
    }
}

/// Searches the public web.
pub struct WebSearchTool {
    search: Arc<dyn WebSearch>,
}

impl WebSearchTool {
    /// Wrap a web search backend.
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for up-to-date public information. Use only when the document is unlikely to contain the answer."
    }

    fn parameters(&self) -> Value {
        query_schema("Web search query.")
    }

    async fn call(&self, arguments: Value) -> String {
        let Some(query) = string_argument(&arguments, "query") else {
            return "Web search failed: missing `query` argument".to_string();
        };
        tracing::info!(tool = "web_search", query, "Searching the web");
        match self.search.search(query).await {
            Ok(results) => format_results(&results),
            Err(error) => {
                tracing::warn!(tool = "web_search", %error, "Web search failed");
                format!("Web search failed: {error}")
            }
        }
    }
}

/// Scratchpad for intermediate reasoning; echoes the thought back.
pub struct ThinkTool;

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Use as a scratchpad to reason about the plan, intermediate results, and what to do next."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": { "type": "string", "description": "Your reasoning." }
            },
            "required": ["thought"]
        })
    }

    async fn call(&self, arguments: Value) -> String {
        match string_argument(&arguments, "thought") {
            Some(thought) => format!("Thought recorded: {thought}"),
            None => "Thought recorded.".to_string(),
        }
    }
}
