//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::{
    filters::{NAMESPACE_KEY, namespace_filter},
    payload::{build_payload, current_timestamp_rfc3339, point_id},
    types::{QdrantError, QueryResponse, QueryResponseResult, ScoredPoint},
};
use crate::store::{ScoredChunk, StoreError, VectorRecord, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations against one collection.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: u64,
}

impl QdrantService {
    /// Construct a new client using the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("research-assistant/0.1")
            .build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.qdrant_collection_name,
            has_api_key = config
                .qdrant_api_key
                .as_deref()
                .is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
            vector_size: config.embedding_dimension as u64,
        })
    }

    /// Create the collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            tracing::info!(collection = %self.collection, "Collection already exists");
            return Ok(());
        }

        tracing::info!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Creating collection"
        );
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection created");
        })
        .await
    }

    /// Ensure the keyword payload index used for namespace filtering exists.
    pub async fn ensure_namespace_index(&self) -> Result<(), QdrantError> {
        let body = json!({
            "field_name": NAMESPACE_KEY,
            "field_schema": "keyword",
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}/index", self.collection))
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(collection = %self.collection, "Namespace index already exists");
            return Ok(());
        }

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Namespace index ensured");
        })
        .await
    }

    /// Upload vectors to the collection, tagging each with its namespace.
    pub async fn upsert_points(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, QdrantError> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let points: Vec<Value> = records
            .iter()
            .map(|record| {
                json!({
                    "id": point_id(namespace, &record.chunk_id),
                    "vector": record.vector,
                    "payload": build_payload(namespace, record, &now),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(namespace, points = point_count, "Points upserted");
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search restricted to one namespace.
    pub async fn search_points(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
            "filter": namespace_filter(namespace),
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(namespace, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| ScoredPoint {
                id: stringify_point_id(point.id),
                score: point.score,
                payload: point.payload,
            })
            .collect())
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        self.create_collection_if_not_exists().await?;
        self.ensure_namespace_index().await?;
        Ok(())
    }

    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize, StoreError> {
        Ok(self.upsert_points(namespace, records).await?)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        let points = self.search_points(namespace, vector, top_k).await?;
        Ok(points.into_iter().map(into_scored_chunk).collect())
    }
}

fn into_scored_chunk(point: ScoredPoint) -> ScoredChunk {
    let mut payload = point.payload.unwrap_or_default();
    let text_field = |value: Option<Value>| match value {
        Some(Value::String(text)) => Some(text),
        _ => None,
    };
    ScoredChunk {
        chunk_id: text_field(payload.remove("chunk_id")),
        score: point.score,
        text: text_field(payload.remove("text")),
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };

    fn service(base_url: String) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("research-assistant-test")
                .build()
                .expect("client"),
            base_url,
            api_key: Some("secret".into()),
            collection: "research".into(),
            vector_size: 4,
        }
    }

    fn record(index: usize) -> VectorRecord {
        VectorRecord {
            chunk_id: format!("vec-{index}"),
            vector: vec![0.1, 0.2, 0.3, 0.4],
            text: format!("chunk {index}"),
            filename: "paper.pdf".into(),
            page: Some(1),
        }
    }

    #[tokio::test]
    async fn query_is_scoped_to_namespace() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/research/points/query")
                    .header("api-key", "secret")
                    .body_contains("\"key\":\"namespace\"")
                    .body_contains("\"value\":\"ns-1\"")
                    .body_contains("\"limit\":5");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "points": [
                            {
                                "id": "2b1f0c2e-0000-5000-8000-000000000000",
                                "score": 0.91,
                                "payload": { "text": "Alpha", "chunk_id": "vec-1" }
                            },
                            { "id": 7, "score": 0.42, "payload": { "filename": "x" } }
                        ]
                    }
                }));
            })
            .await;

        let hits = service(server.base_url())
            .query("ns-1", vec![0.1, 0.2, 0.3, 0.4], 5)
            .await
            .expect("query");

        mock.assert();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text.as_deref(), Some("Alpha"));
        assert_eq!(hits[0].chunk_id.as_deref(), Some("vec-1"));
        assert!((hits[0].score - 0.91).abs() < f32::EPSILON);
        assert!(hits[1].text.is_none());
    }

    #[tokio::test]
    async fn upsert_sends_namespaced_points() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/research/points")
                    .query_param("wait", "true")
                    .body_contains("\"namespace\":\"ns-9\"")
                    .body_contains("\"chunk_id\":\"vec-1\"")
                    .body_contains("\"text\":\"chunk 0\"");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "result": { "operation_id": 1, "status": "completed" }
                }));
            })
            .await;

        let stored = service(server.base_url())
            .upsert("ns-9", vec![record(0), record(1)])
            .await
            .expect("upsert");

        mock.assert();
        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn upsert_of_nothing_skips_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/research/points");
                then.status(200);
            })
            .await;

        let stored = service(server.base_url())
            .upsert("ns-9", Vec::new())
            .await
            .expect("upsert");

        mock.assert_hits(0);
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn ensure_index_creates_missing_collection() {
        let server = MockServer::start_async().await;
        let exists = server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/research");
                then.status(404).json_body(json!({ "status": { "error": "Not found" } }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/research")
                    .body_contains("\"distance\":\"Cosine\"")
                    .body_contains("\"size\":4");
                then.status(200).json_body(json!({ "result": true }));
            })
            .await;
        let index = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/research/index")
                    .body_contains("\"field_name\":\"namespace\"");
                then.status(200).json_body(json!({ "result": { "status": "acknowledged" } }));
            })
            .await;

        service(server.base_url())
            .ensure_index()
            .await
            .expect("ensure index");

        exists.assert();
        create.assert();
        index.assert();
    }

    #[tokio::test]
    async fn ensure_index_keeps_existing_collection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/collections/research");
                then.status(200).json_body(json!({ "result": {} }));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/research");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/research/index");
                then.status(409).body("already exists");
            })
            .await;

        service(server.base_url())
            .ensure_index()
            .await
            .expect("ensure index");

        create.assert_hits(0);
    }

    #[tokio::test]
    async fn query_failure_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/collections/research/points/query");
                then.status(500).body("boom");
            })
            .await;

        let error = service(server.base_url())
            .query("ns-1", vec![0.0; 4], 5)
            .await
            .expect_err("query should fail");

        assert!(error.to_string().contains("500"));
    }
}
