//! Core data types and error definitions for the ingestion pipeline.

use crate::embedding::EmbeddingClientError;
use crate::parsing::ParseError;
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would stop the splitter from advancing.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors emitted by the document ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Parsing produced no usable text.
    #[error("Could not extract text.")]
    EmptyDocument,
    /// Upload could not be written to the staging directory.
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),
    /// Parser failed to extract the document.
    #[error("Failed to parse document: {0}")]
    Parsing(#[from] ParseError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector store rejected the chunks.
    #[error("Failed to store chunks: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the failure stems from the uploaded document rather than a dependency.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyDocument | Self::Parsing(ParseError::JobFailed { .. })
        )
    }
}

/// A chunk of extracted text awaiting embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    /// Chunk text.
    pub text: String,
    /// Page the chunk came from, when known.
    pub page: Option<u32>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    /// Name of the uploaded file.
    pub filename: String,
    /// Freshly generated namespace holding the document's vectors.
    pub namespace: String,
    /// Number of chunks stored under the namespace.
    #[serde(skip)]
    pub chunk_count: usize,
}
