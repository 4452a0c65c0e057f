#![deny(missing_docs)]

//! Core library for the document-grounded research assistant.

/// Agent invocation, tools, and the OpenAI-compatible chat agent.
pub mod agent;
/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document ingestion pipeline.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and query counters.
pub mod metrics;
/// Document parsing capability and the LlamaParse client.
pub mod parsing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Plan/execute/report orchestration and its streaming protocol.
pub mod research;
/// Namespace-scoped document retrieval rendered as text.
pub mod retrieval;
/// Web search capability and the Exa client.
pub mod search;
/// Vector store capability shared by ingestion and retrieval.
pub mod store;

#[cfg(test)]
mod test_support;
