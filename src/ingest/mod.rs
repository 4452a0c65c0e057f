//! Document ingestion: staging, parsing, chunking, embedding, and namespaced storage.

pub mod chunking;
pub mod sanitize;
mod service;
pub mod types;

pub use service::{IngestService, UPSERT_BATCH_SIZE};
pub use types::{ChunkingError, DocumentChunk, IngestError, IngestOutcome};
