//! HTTP server entrypoint.
//!
//! Validates configuration, ensures the vector collection exists, and serves the research API.
use anyhow::{Context, Result};
use clap::Parser;
use research_assistant::{
    agent::ChatAgent,
    api::{self, AppState},
    config,
    embedding::HostedEmbeddingClient,
    ingest::IngestService,
    logging,
    metrics::ServiceMetrics,
    parsing::LlamaParseClient,
    qdrant::QdrantService,
    research::ResearchPipeline,
    search::ExaClient,
    store::VectorStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "research-assistant",
    about = "Document-grounded research assistant API"
)]
struct Cli {
    /// Interface to bind (overrides SERVER_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("invalid configuration")?;
    logging::init_tracing(config.log_file.as_deref());
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        llm_model = %config.llm_model,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        "Loaded configuration"
    );

    let embedder = Arc::new(
        HostedEmbeddingClient::from_config(config).context("failed to build embedding client")?,
    );
    let store = Arc::new(QdrantService::from_config(config).context("failed to build Qdrant client")?);
    tracing::info!(collection = %config.qdrant_collection_name, "Ensuring vector collection");
    store
        .ensure_index()
        .await
        .context("failed to prepare Qdrant collection")?;

    let metrics = Arc::new(ServiceMetrics::new());
    let parser = Arc::new(LlamaParseClient::from_config(config).context("failed to build parser client")?);
    let agent = Arc::new(ChatAgent::from_config(config));
    let web_search = Arc::new(ExaClient::from_config(config).context("failed to build search client")?);

    let state = AppState {
        ingest: Arc::new(IngestService::new(
            parser,
            embedder.clone(),
            store.clone(),
            config.upload_dir.clone(),
            metrics.clone(),
        )),
        pipeline: ResearchPipeline::new(agent, embedder, store, web_search, metrics.clone()),
        metrics,
    };
    let app = api::create_router(state, config.max_upload_bytes);

    let host = cli.host.unwrap_or_else(|| config.server_host.clone());
    let port = cli.port.unwrap_or(config.server_port);
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    tracing::info!("Listening on http://{host}:{port}");
    axum::serve(listener, app).await.context("server terminated unexpectedly")?;

    Ok(())
}
