//! Embedding capability and the hosted OpenAI-compatible adapter.
//!
//! Documents and questions share one embedding space: both are encoded with the provider's
//! `query` input type so that stored chunks and search text stay comparable.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider returned vectors of an unexpected size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the vector index.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints (NVIDIA NIM by default).
pub struct HostedEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HostedEmbeddingClient {
    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("research-assistant/embeddings")
            .build()?;
        Ok(Self {
            http,
            base_url: config.embedding_base_url.clone(),
            api_key: config.embedding_api_key.clone(),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
            batch_size: config.embedding_batch_size.max(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let payload = json!({
            "model": self.model,
            "input": batch,
            "input_type": "query",
            "encoding_format": "float",
            "truncate": "END",
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, model = %self.model, "Embedding request rejected");
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let EmbeddingResponse { mut data } = response.json().await?;
        if data.len() != batch.len() {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "expected {} vectors, received {}",
                batch.len(),
                data.len()
            )));
        }
        data.sort_by_key(|item| item.index);

        data.into_iter()
            .map(|item| {
                if item.embedding.len() == self.dimension {
                    Ok(item.embedding)
                } else {
                    Err(EmbeddingClientError::DimensionMismatch {
                        expected: self.dimension,
                        actual: item.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for HostedEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            dimension = self.dimension,
            texts = texts.len(),
            "Generating embeddings"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client(base_url: String, dimension: usize, batch_size: usize) -> HostedEmbeddingClient {
        HostedEmbeddingClient {
            http: Client::builder()
                .user_agent("research-assistant-test")
                .build()
                .expect("client"),
            base_url,
            api_key: "test-key".into(),
            model: "nvidia/nv-embed-v1".into(),
            dimension,
            batch_size,
        }
    }

    #[tokio::test]
    async fn returns_vectors_in_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer test-key")
                    .body_contains("\"input_type\":\"query\"");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = client(server.base_url(), 2, 8)
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn splits_requests_by_batch_size() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [ { "index": 0, "embedding": [0.5, 0.5] } ]
                }));
            })
            .await;

        let vectors = client(server.base_url(), 2, 1)
            .generate_embeddings(vec!["a".into(), "b".into(), "c".into()])
            .await
            .expect("embeddings");

        mock.assert_hits(3);
        assert_eq!(vectors.len(), 3);
    }

    #[tokio::test]
    async fn rejects_wrong_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [ { "index": 0, "embedding": [0.5, 0.5, 0.5] } ]
                }));
            })
            .await;

        let error = client(server.base_url(), 2, 4)
            .generate_embeddings(vec!["a".into()])
            .await
            .expect_err("dimension mismatch");

        assert!(matches!(
            error,
            EmbeddingClientError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn surfaces_provider_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401).body("unauthorized");
            })
            .await;

        let error = client(server.base_url(), 2, 4)
            .generate_embeddings(vec!["a".into()])
            .await
            .expect_err("provider error");

        assert!(error.to_string().contains("401"));
    }
}
