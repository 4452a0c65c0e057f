//! HTTP surface for the research assistant.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /upload/` – Multipart upload (`file` field). Parses, chunks, and embeds the document into
//!   a fresh namespace and returns `{ "filename", "namespace" }`.
//! - `POST /query/` – Runs the plan/execute/report pipeline for `{ prompt, namespace }` and returns
//!   `{ "report" }`.
//! - `POST /query-stream/` – Same pipeline, streamed as server-sent events (one JSON event per
//!   `data:` frame) ending in exactly one `complete` or `error` event.
//! - `OPTIONS /query-stream/` – Preflight acknowledgement.
//! - `GET /metrics` – Upload and query counters.
//!
//! Query input is accepted as urlencoded form, multipart form, or JSON. Every route is also
//! reachable without the trailing slash.

use crate::ingest::{IngestError, IngestService};
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::research::{PipelineError, ResearchPipeline};
use async_trait::async_trait;
use axum::{
    Form, Json, Router,
    extract::{
        DefaultBodyLimit, FromRequest, Multipart, Request, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{
        StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
        },
    },
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, options, post},
};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared handles used by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Document ingestion service.
    pub ingest: Arc<IngestService>,
    /// Research pipeline.
    pub pipeline: ResearchPipeline,
    /// Service counters.
    pub metrics: Arc<ServiceMetrics>,
}

/// Build the HTTP router; request bodies are capped at `max_upload_bytes`.
///
/// `CorsLayer` answers every `OPTIONS` request itself, so the streaming preflight routes are
/// merged in outside of it and set their own headers.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let routes = Router::new()
        .route("/upload/", post(upload_document))
        .route("/upload", post(upload_document))
        .route("/query/", post(run_query))
        .route("/query", post(run_query))
        .route("/query-stream/", post(stream_query))
        .route("/query-stream", post(stream_query))
        .route("/metrics", get(get_metrics))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/query-stream/", options(preflight))
        .route("/query-stream", options(preflight))
        .merge(routes)
        .with_state(state)
}

/// Success response for the upload endpoint.
#[derive(Serialize)]
struct UploadResponse {
    filename: String,
    namespace: String,
}

/// Ingest the multipart `file` field into a new namespace.
async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest(rejection.to_string()))?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_owned)
            .unwrap_or_else(|| "upload".to_string());
        let bytes = field.bytes().await?;
        let outcome = state.ingest.ingest(&filename, &bytes).await?;
        tracing::info!(
            filename = %outcome.filename,
            namespace = %outcome.namespace,
            chunks = outcome.chunk_count,
            "Upload request completed"
        );
        return Ok(Json(UploadResponse {
            filename: outcome.filename,
            namespace: outcome.namespace,
        }));
    }

    Err(ApiError::BadRequest("Missing required field: file".into()))
}

/// Validated `{ prompt, namespace }` pair.
struct QueryInput {
    prompt: String,
    namespace: String,
}

#[derive(Default, Deserialize)]
struct QueryFields {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

impl QueryFields {
    fn validate(self) -> Result<QueryInput, ApiError> {
        fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
            value
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ApiError::BadRequest(format!("Missing required field: {name}")))
        }
        Ok(QueryInput {
            prompt: required(self.prompt, "prompt")?,
            namespace: required(self.namespace, "namespace")?,
        })
    }
}

#[async_trait]
impl<S> FromRequest<S> for QueryInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let fields = if content_type.starts_with("application/json") {
            let Json(fields) = Json::<QueryFields>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.to_string()))?;
            fields
        } else if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.to_string()))?;
            let mut fields = QueryFields::default();
            while let Some(field) = multipart.next_field().await? {
                let name = field.name().map(str::to_owned);
                match name.as_deref() {
                    Some("prompt") => fields.prompt = Some(field.text().await?),
                    Some("namespace") => fields.namespace = Some(field.text().await?),
                    _ => {}
                }
            }
            fields
        } else {
            let Form(fields) = Form::<QueryFields>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.to_string()))?;
            fields
        };

        fields.validate()
    }
}

/// Success response for the batch query endpoint.
#[derive(Serialize)]
struct QueryResponse {
    report: String,
}

/// Run the full pipeline and return the report.
async fn run_query(
    State(state): State<AppState>,
    input: QueryInput,
) -> Result<Json<QueryResponse>, ApiError> {
    let outcome = state.pipeline.run(&input.prompt, &input.namespace).await?;
    Ok(Json(QueryResponse {
        report: outcome.report,
    }))
}

/// Stream pipeline progress as server-sent events.
async fn stream_query(
    State(state): State<AppState>,
    input: QueryInput,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::info!(namespace = %input.namespace, "Streaming query accepted");
    let events = state
        .pipeline
        .run_stream(input.prompt, input.namespace)
        .map(|event| Event::default().json_data(event));
    Sse::new(events)
}

/// Acknowledge preflight requests for the streaming endpoint.
async fn preflight() -> impl IntoResponse {
    (
        [
            (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (ACCESS_CONTROL_ALLOW_METHODS, "*"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
        Json(json!({ "status": "ok" })),
    )
}

/// Return the service counters.
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// Handler failure rendered as a JSON body.
#[derive(Debug)]
enum ApiError {
    /// Caller supplied unusable input; body `{ "error" }`.
    BadRequest(String),
    /// Server-side failure; body `{ "error", "traceback" }`.
    Internal { error: String, traceback: String },
}

impl ApiError {
    fn internal(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::Internal {
            error: error.to_string(),
            traceback: render_chain(error),
        }
    }
}

/// Render an error and its `source()` chain, one cause per line.
fn render_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("Caused by: {cause}"));
        source = cause.source();
    }
    lines.join("\n")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(error) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
            }
            Self::Internal { error, traceback } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error, "traceback": traceback })),
            )
                .into_response(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        if error.is_client_error() {
            tracing::warn!(%error, "Rejected upload");
            Self::BadRequest(error.to_string())
        } else {
            tracing::error!(%error, "Upload failed");
            Self::internal(&error)
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self::internal(&error)
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::BadRequest(error.to_string())
    }
}
