//! In-memory fakes of every external capability for unit tests.

use crate::agent::{AgentError, AgentInvoker, AgentRequest, AgentRole, FragmentStream};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::parsing::{DocumentParser, ParseError, ParsedSection};
use crate::search::{SearchError, WebResult, WebSearch};
use crate::store::{ScoredChunk, StoreError, VectorRecord, VectorStore};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const FAKE_DIMENSION: usize = 64;

/// Bag-of-words embedder: texts sharing words land close together.
#[derive(Default)]
pub(crate) struct HashingEmbedder {
    pub calls: AtomicUsize,
}

pub(crate) fn hash_embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; FAKE_DIMENSION];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |acc, byte| acc.wrapping_mul(31).wrapping_add(byte as usize));
        vector[bucket % FAKE_DIMENSION] += 1.0;
    }
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|value| *value /= norm);
    }
    vector
}

#[async_trait]
impl EmbeddingClient for HashingEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| hash_embed(text)).collect())
    }
}

/// Embedder that always fails.
pub(crate) struct FailingEmbedder;

#[async_trait]
impl EmbeddingClient for FailingEmbedder {
    async fn generate_embeddings(
        &self,
        _texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Err(EmbeddingClientError::GenerationFailed(
            "embedding service offline".into(),
        ))
    }
}

/// Namespace-partitioned store ranking by dot product.
#[derive(Default)]
pub(crate) struct InMemoryVectorStore {
    records: Mutex<HashMap<String, Vec<VectorRecord>>>,
    pub upsert_batches: Mutex<Vec<usize>>,
}

impl InMemoryVectorStore {
    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.records
            .lock()
            .expect("store lock")
            .get(namespace)
            .map_or(0, Vec::len)
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("store lock")
            .keys()
            .cloned()
            .collect()
    }

    pub fn records(&self, namespace: &str) -> Vec<VectorRecord> {
        self.records
            .lock()
            .expect("store lock")
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, StoreError> {
        let count = records.len();
        self.upsert_batches.lock().expect("batch lock").push(count);
        let mut guard = self.records.lock().expect("store lock");
        let existing = guard.entry(namespace.to_string()).or_default();
        for record in records {
            existing.retain(|stored| stored.chunk_id != record.chunk_id);
            existing.push(record);
        }
        Ok(count)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let guard = self.records.lock().expect("store lock");
        let mut hits: Vec<ScoredChunk> = guard
            .get(namespace)
            .into_iter()
            .flatten()
            .map(|record| ScoredChunk {
                chunk_id: Some(record.chunk_id.clone()),
                score: record
                    .vector
                    .iter()
                    .zip(&vector)
                    .map(|(left, right)| left * right)
                    .sum(),
                text: Some(record.text.clone()),
            })
            .collect();
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Store whose every operation fails.
pub(crate) struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn upsert(
        &self,
        _namespace: &str,
        _records: Vec<VectorRecord>,
    ) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }

    async fn query(
        &self,
        _namespace: &str,
        _vector: Vec<f32>,
        _top_k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        Err(StoreError::Unavailable("store offline".into()))
    }
}

/// Parser returning fixed sections regardless of input.
pub(crate) struct StaticParser {
    pub sections: Vec<ParsedSection>,
}

impl StaticParser {
    pub fn pages(pages: &[&str]) -> Self {
        Self {
            sections: pages
                .iter()
                .enumerate()
                .map(|(index, text)| ParsedSection {
                    text: (*text).to_string(),
                    page: Some(index as u32 + 1),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl DocumentParser for StaticParser {
    async fn parse(&self, path: &Path, _filename: &str) -> Result<Vec<ParsedSection>, ParseError> {
        tokio::fs::metadata(path).await?;
        Ok(self.sections.clone())
    }
}

/// Web search returning one canned result and counting calls.
#[derive(Default)]
pub(crate) struct StaticWebSearch {
    pub calls: AtomicUsize,
}

#[async_trait]
impl WebSearch for StaticWebSearch {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![WebResult {
            title: Some("Web result".into()),
            url: "https://example.org/result".into(),
            text: Some(format!("Public information about {query}.")),
        }])
    }
}

/// Agent that answers each stage with canned text and drives the executor's tools.
///
/// The executor calls `document_tool` with the request input and falls back to `web_search`
/// when the document has nothing; the reporter echoes what the executor found.
#[derive(Default)]
pub(crate) struct ScriptedAgent {
    pub fail_role: Option<AgentRole>,
    pub streamed_roles: Mutex<Vec<AgentRole>>,
}

impl ScriptedAgent {
    pub fn failing_at(role: AgentRole) -> Self {
        Self {
            fail_role: Some(role),
            ..Self::default()
        }
    }

    async fn respond(&self, request: &AgentRequest) -> Result<Vec<String>, AgentError> {
        if self.fail_role == Some(request.role) {
            return Err(AgentError::Provider(format!(
                "{} stage unavailable",
                request.role
            )));
        }
        match request.role {
            AgentRole::Planner => Ok(vec![
                "1. Search the document. ".into(),
                "2. Summarize findings.".into(),
            ]),
            AgentRole::Executor => {
                let document = find_tool(request, "document_tool")?;
                let mut found = document.call(json!({ "query": request.input })).await;
                if found.starts_with(crate::retrieval::NO_INFORMATION) {
                    let web = find_tool(request, "web_search")?;
                    found = web.call(json!({ "query": request.input })).await;
                }
                Ok(vec!["Executed plan. ".into(), found])
            }
            AgentRole::Reporter => {
                let execution = request
                    .instructions
                    .iter()
                    .find(|line| line.starts_with("Gathered Information:"))
                    .cloned()
                    .unwrap_or_default();
                let body = if execution.contains("Information from the document") {
                    "Source: the uploaded document."
                } else if execution.contains("https://") {
                    "The uploaded document did not contain sufficient information. Source: web search results."
                } else {
                    "The available information was insufficient."
                };
                Ok(vec!["# Report\n".into(), body.into()])
            }
        }
    }
}

fn find_tool<'a>(
    request: &'a AgentRequest,
    name: &str,
) -> Result<&'a std::sync::Arc<dyn crate::agent::Tool>, AgentError> {
    request
        .tools
        .iter()
        .find(|tool| tool.name() == name)
        .ok_or_else(|| AgentError::Provider(format!("tool {name} not offered")))
}

#[async_trait]
impl AgentInvoker for ScriptedAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<String, AgentError> {
        Ok(self.respond(&request).await?.concat())
    }

    fn invoke_streaming(&self, request: AgentRequest) -> FragmentStream {
        self.streamed_roles
            .lock()
            .expect("roles lock")
            .push(request.role);
        let scripted = ScriptedAgent {
            fail_role: self.fail_role,
            ..Self::default()
        };
        Box::pin(async_stream::try_stream! {
            for fragment in scripted.respond(&request).await? {
                yield fragment;
            }
        })
    }
}
