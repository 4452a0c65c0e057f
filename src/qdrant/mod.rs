//! Qdrant vector store integration.
//!
//! All documents share one collection; the namespace lives in each point's payload and every
//! query carries a namespace filter.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use filters::namespace_filter;
pub use payload::compute_chunk_hash;
pub use types::{QdrantError, ScoredPoint};
