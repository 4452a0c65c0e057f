//! Ingestion service coordinating staging, parsing, chunking, embedding, and storage.

use crate::{
    embedding::{EmbeddingClient, EmbeddingClientError},
    ingest::{
        chunking::{CHUNK_OVERLAP, CHUNK_SIZE, split_text},
        sanitize::sanitize_filename,
        types::{DocumentChunk, IngestError, IngestOutcome},
    },
    metrics::ServiceMetrics,
    parsing::{DocumentParser, ParsedSection},
    store::{VectorRecord, VectorStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum number of records written to the store per request.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Turns an uploaded document into a freshly namespaced set of searchable chunks.
///
/// Construct once at startup and share through an `Arc`; every call to [`ingest`](Self::ingest)
/// is independent and allocates its own namespace.
pub struct IngestService {
    parser: Arc<dyn DocumentParser>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    staging_dir: PathBuf,
    metrics: Arc<ServiceMetrics>,
}

impl IngestService {
    /// Assemble the service from its capabilities.
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        staging_dir: impl Into<PathBuf>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            parser,
            embedder,
            store,
            staging_dir: staging_dir.into(),
            metrics,
        }
    }

    /// Stage, parse, chunk, embed, and store one uploaded document.
    ///
    /// Nothing is written to the store when the document yields no text.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestOutcome, IngestError> {
        let staged = self.stage(filename, bytes).await?;
        tracing::info!(filename, path = %staged.display(), bytes = bytes.len(), "Upload staged");

        let sections = self.parser.parse(&staged, filename).await?;
        let chunks = chunk_sections(sections)?;
        if chunks.is_empty() {
            tracing::warn!(filename, "Parser produced no text");
            return Err(IngestError::EmptyDocument);
        }

        let namespace = Uuid::new_v4().to_string();
        tracing::info!(
            filename,
            namespace = %namespace,
            chunks = chunks.len(),
            "Storing document chunks"
        );

        let mut stored = 0;
        for (batch_index, batch) in chunks.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = self.embedder.generate_embeddings(texts).await?;
            if vectors.len() != batch.len() {
                return Err(IngestError::Embedding(
                    EmbeddingClientError::GenerationFailed(format!(
                        "expected {} vectors, received {}",
                        batch.len(),
                        vectors.len()
                    )),
                ));
            }

            let offset = batch_index * UPSERT_BATCH_SIZE;
            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(position, (chunk, vector))| VectorRecord {
                    chunk_id: format!("vec-{}", offset + position),
                    vector,
                    text: chunk.text.clone(),
                    filename: filename.to_string(),
                    page: chunk.page,
                })
                .collect();

            stored += self.store.upsert(&namespace, records).await?;
            tracing::debug!(namespace = %namespace, batch = batch_index, stored, "Batch stored");
        }

        self.metrics.record_upload(stored as u64);
        tracing::info!(filename, namespace = %namespace, chunks = stored, "Document indexed");

        Ok(IngestOutcome {
            filename: filename.to_string(),
            namespace,
            chunk_count: stored,
        })
    }

    async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(IngestError::Staging)?;
        let path = self
            .staging_dir
            .join(format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename)));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(IngestError::Staging)?;
        Ok(path)
    }
}

fn chunk_sections(sections: Vec<ParsedSection>) -> Result<Vec<DocumentChunk>, IngestError> {
    let mut chunks = Vec::new();
    for section in sections {
        for text in split_text(&section.text, CHUNK_SIZE, CHUNK_OVERLAP)? {
            chunks.push(DocumentChunk {
                text,
                page: section.page,
            });
        }
    }
    Ok(chunks)
}
