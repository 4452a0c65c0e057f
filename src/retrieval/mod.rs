//! Retrieval over one document namespace, rendered as text for agents.
//!
//! Retrieval never fails from the caller's point of view: empty results become a fixed
//! sentinel and backend errors become an error sentence, so an agent can reason about either.

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::store::{StoreError, VectorStore};
use std::sync::Arc;
use thiserror::Error;

/// Number of chunks returned per query.
pub const TOP_K: usize = 5;
/// Answer given when the namespace holds nothing relevant.
pub const NO_INFORMATION: &str = "No information found in the document for this query.";
const FOUND_PREFIX: &str = "Information from the document:\n";

#[derive(Debug, Error)]
enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Document retrieval bound to a single namespace.
#[derive(Clone)]
pub struct DocumentRetriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    namespace: String,
}

impl DocumentRetriever {
    /// Bind retrieval to `namespace`.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            namespace: namespace.into(),
        }
    }

    /// Namespace this retriever searches.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up the chunks closest to `query` and render them as text.
    pub async fn retrieve(&self, query: &str) -> String {
        let preview: String = query.chars().take(60).collect();
        tracing::info!(namespace = %self.namespace, query = %preview, "Searching document");

        match self.lookup(query).await {
            Ok(texts) if texts.is_empty() => NO_INFORMATION.to_string(),
            Ok(texts) => format!("{FOUND_PREFIX}{}", texts.join("\n")),
            Err(error) => {
                tracing::warn!(namespace = %self.namespace, %error, "Document retrieval failed");
                format!("Error retrieving from document: {error}")
            }
        }
    }

    async fn lookup(&self, query: &str) -> Result<Vec<String>, RetrievalError> {
        let vector = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingClientError::GenerationFailed("no vector returned".into()))?;
        let hits = self.store.query(&self.namespace, vector, TOP_K).await?;

        // Hits without stored text contribute an empty line; all-empty means nothing found.
        let texts: Vec<String> = hits
            .into_iter()
            .map(|hit| hit.text.unwrap_or_default())
            .collect();
        if texts.iter().all(String::is_empty) {
            return Ok(Vec::new());
        }
        Ok(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::VectorRecord;
    use crate::test_support::{FailingStore, HashingEmbedder, InMemoryVectorStore, hash_embed};

    async fn seeded_store(namespace: &str, texts: &[&str]) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::default());
        let records = texts
            .iter()
            .enumerate()
            .map(|(index, text)| VectorRecord {
                chunk_id: format!("vec-{index}"),
                vector: hash_embed(text),
                text: (*text).to_string(),
                filename: "doc.txt".into(),
                page: None,
            })
            .collect();
        store.upsert(namespace, records).await.expect("seed");
        store
    }

    #[tokio::test]
    async fn joins_hits_with_prefix() {
        let store = seeded_store("ns-a", &["Revenue was 10M.", "Headcount is 40."]).await;
        let retriever = DocumentRetriever::new(Arc::new(HashingEmbedder::default()), store, "ns-a");

        let answer = retriever.retrieve("What was revenue?").await;

        assert!(answer.starts_with("Information from the document:\nRevenue was 10M."));
        assert!(answer.contains("\nHeadcount is 40."));
    }

    #[tokio::test]
    async fn returns_at_most_five_chunks() {
        let texts: Vec<String> = (0..8).map(|index| format!("fact number {index}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let store = seeded_store("ns-a", &refs).await;
        let retriever = DocumentRetriever::new(Arc::new(HashingEmbedder::default()), store, "ns-a");

        let answer = retriever.retrieve("fact").await;

        assert_eq!(answer.matches("fact number").count(), TOP_K);
    }

    #[tokio::test]
    async fn empty_namespace_yields_sentinel() {
        let store = seeded_store("ns-a", &["Revenue was 10M."]).await;
        let retriever = DocumentRetriever::new(Arc::new(HashingEmbedder::default()), store, "ns-b");

        assert_eq!(retriever.retrieve("revenue").await, NO_INFORMATION);
    }

    #[tokio::test]
    async fn backend_errors_become_text() {
        let retriever = DocumentRetriever::new(
            Arc::new(HashingEmbedder::default()),
            Arc::new(FailingStore),
            "ns-a",
        );

        let answer = retriever.retrieve("revenue").await;

        assert!(answer.starts_with("Error retrieving from document: "));
        assert!(answer.contains("store offline"));
    }
}
