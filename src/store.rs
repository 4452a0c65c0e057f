//! Vector store capability shared by ingestion and retrieval.
//!
//! Every operation is scoped by a namespace: records written under one namespace are never
//! returned by queries against another.

use crate::qdrant::QdrantError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Qdrant rejected or failed a request.
    #[error("Vector store request failed: {0}")]
    Qdrant(#[from] QdrantError),
    /// Backend could not be reached or refused the operation.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
}

/// One chunk ready to be written to the store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    /// Identifier unique within one upload batch (`vec-<i>`).
    pub chunk_id: String,
    /// Embedding vector produced for the chunk.
    pub vector: Vec<f32>,
    /// Chunk text returned by retrieval.
    pub text: String,
    /// Name of the uploaded file the chunk came from.
    pub filename: String,
    /// Page the chunk was extracted from, when the parser reports pages.
    pub page: Option<u32>,
}

/// Nearest-neighbour hit returned by a namespace query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Batch-local chunk identifier, if stored.
    pub chunk_id: Option<String>,
    /// Similarity score reported by the backend.
    pub score: f32,
    /// Stored chunk text, if present in the payload.
    pub text: Option<String>,
}

/// Interface implemented by vector index backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Make sure the backing index exists, creating it when absent.
    async fn ensure_index(&self) -> Result<(), StoreError>;

    /// Write records under `namespace`, returning how many were stored.
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>)
    -> Result<usize, StoreError>;

    /// Return up to `top_k` records nearest to `vector` within `namespace`.
    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError>;
}
