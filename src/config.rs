use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_LLM_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
const DEFAULT_LLM_MODEL: &str = "nvidia/llama-3.3-nemotron-super-49b-v1.5";
const DEFAULT_EMBEDDING_MODEL: &str = "nvidia/nv-embed-v1";
const DEFAULT_EMBEDDING_DIMENSION: usize = 4096;
const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 32;
const DEFAULT_AGENT_MAX_TOOL_ROUNDS: usize = 8;
const DEFAULT_LLAMA_CLOUD_BASE_URL: &str = "https://api.cloud.llamaindex.ai";
const DEFAULT_EXA_BASE_URL: &str = "https://api.exa.ai";
const DEFAULT_EXA_NUM_RESULTS: usize = 5;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the research assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Credential for the hosted language-model endpoint.
    pub nvidia_api_key: String,
    /// Base URL of the OpenAI-compatible chat completion API.
    pub llm_base_url: String,
    /// Chat model used by every agent role.
    pub llm_model: String,
    /// Upper bound on tool-call rounds an agent may take before it must answer.
    pub agent_max_tool_rounds: usize,
    /// Base URL of the OpenAI-compatible embeddings API.
    pub embedding_base_url: String,
    /// Credential for the embeddings API.
    pub embedding_api_key: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Number of texts sent per embeddings request.
    pub embedding_batch_size: usize,
    /// Credential for the LlamaParse document parsing service.
    pub llama_cloud_api_key: String,
    /// Base URL of the LlamaParse API.
    pub llama_cloud_base_url: String,
    /// Credential for the Exa web search API.
    pub exa_api_key: String,
    /// Base URL of the Exa API.
    pub exa_base_url: String,
    /// Number of web results requested per search.
    pub exa_num_results: usize,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection shared by every document namespace.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Directory where uploaded files are staged before parsing.
    pub upload_dir: PathBuf,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
    /// Interface the HTTP server binds to.
    pub server_host: String,
    /// Port the HTTP server binds to.
    pub server_port: u16,
    /// File that logs are appended to instead of the default location.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let nvidia_api_key = vars.required("NVIDIA_API_KEY")?;
        let llm_base_url = vars.or("LLM_BASE_URL", DEFAULT_LLM_BASE_URL);

        Ok(Self {
            llm_model: vars.or("LLM_MODEL", DEFAULT_LLM_MODEL),
            agent_max_tool_rounds: vars
                .parsed("AGENT_MAX_TOOL_ROUNDS")?
                .unwrap_or(DEFAULT_AGENT_MAX_TOOL_ROUNDS),
            embedding_base_url: vars.or("EMBEDDING_BASE_URL", &llm_base_url),
            embedding_api_key: vars.or("EMBEDDING_API_KEY", &nvidia_api_key),
            embedding_model: vars.or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            embedding_dimension: vars
                .parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            embedding_batch_size: vars
                .parsed("EMBEDDING_BATCH_SIZE")?
                .unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE)
                .max(1),
            llama_cloud_api_key: vars.required("LLAMA_CLOUD_API_KEY")?,
            llama_cloud_base_url: vars.or("LLAMA_CLOUD_BASE_URL", DEFAULT_LLAMA_CLOUD_BASE_URL),
            exa_api_key: vars.required("EXA_API_KEY")?,
            exa_base_url: vars.or("EXA_BASE_URL", DEFAULT_EXA_BASE_URL),
            exa_num_results: vars
                .parsed("EXA_NUM_RESULTS")?
                .unwrap_or(DEFAULT_EXA_NUM_RESULTS),
            qdrant_url: vars.required("QDRANT_URL")?,
            qdrant_collection_name: vars.required("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: vars.optional("QDRANT_API_KEY"),
            upload_dir: PathBuf::from(vars.or("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            max_upload_bytes: vars
                .parsed("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_host: vars.or("SERVER_HOST", DEFAULT_SERVER_HOST),
            server_port: vars.parsed("SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
            log_file: vars.optional("RESEARCH_ASSISTANT_LOG_FILE").map(PathBuf::from),
            nvidia_api_key,
            llm_base_url,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string()))
            })
            .transpose()
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// A `.env` file in the working directory is honoured when present. Missing credentials are
/// reported to the caller so the binary can refuse to serve traffic.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}
