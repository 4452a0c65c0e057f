//! Document parsing capability backed by the LlamaParse cloud service.
//!
//! Parsing is a three-step exchange: upload the staged file, poll the job until it settles, then
//! fetch the JSON result which carries one text entry per page.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, multipart};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors surfaced while extracting text from a document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Staged file could not be read back from disk.
    #[error("Failed to read staged document: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP layer failed before receiving a response.
    #[error("Parser request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Parser responded with an error status.
    #[error("Parser rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the parser.
        status: reqwest::StatusCode,
        /// Response body describing the failure.
        body: String,
    },
    /// Parsing job finished without producing a result.
    #[error("Parsing job {job_id} ended with status {status}")]
    JobFailed {
        /// Identifier of the parsing job.
        job_id: String,
        /// Terminal status reported by the parser.
        status: String,
    },
    /// Parsing job did not settle within the polling budget.
    #[error("Parsing job {0} timed out")]
    Timeout(String),
}

/// One unit of extracted text, typically a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    /// Extracted text content.
    pub text: String,
    /// Page number reported by the parser, when known.
    pub page: Option<u32>,
}

/// Interface implemented by document parsers.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Extract text sections from the staged file at `path`.
    async fn parse(&self, path: &Path, filename: &str) -> Result<Vec<ParsedSection>, ParseError>;
}

/// LlamaParse REST client.
pub struct LlamaParseClient {
    http: Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl LlamaParseClient {
    /// Build a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ParseError> {
        let http = Client::builder()
            .user_agent("research-assistant/parser")
            .build()?;
        Ok(Self {
            http,
            base_url: config.llama_cloud_base_url.clone(),
            api_key: config.llama_cloud_api_key.clone(),
            poll_interval: POLL_INTERVAL,
            poll_timeout: POLL_TIMEOUT,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/api/v1/parsing/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String, ParseError> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(self.endpoint("upload"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let JobStatus { id, .. } = read_json(response).await?;
        Ok(id)
    }

    async fn wait_for_job(&self, job_id: &str) -> Result<(), ParseError> {
        let started = tokio::time::Instant::now();
        loop {
            let response = self
                .http
                .get(self.endpoint(&format!("job/{job_id}")))
                .bearer_auth(&self.api_key)
                .send()
                .await?;
            let JobStatus { status, .. } = read_json(response).await?;

            match status.as_str() {
                "SUCCESS" | "PARTIAL_SUCCESS" => return Ok(()),
                "PENDING" => {}
                _ => {
                    return Err(ParseError::JobFailed {
                        job_id: job_id.to_string(),
                        status,
                    });
                }
            }

            if started.elapsed() >= self.poll_timeout {
                return Err(ParseError::Timeout(job_id.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn fetch_pages(&self, job_id: &str) -> Result<Vec<ParsedSection>, ParseError> {
        let response = self
            .http
            .get(self.endpoint(&format!("job/{job_id}/result/json")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let JsonResult { pages } = read_json(response).await?;
        Ok(pages
            .into_iter()
            .map(|page| ParsedSection {
                text: page.text,
                page: page.page,
            })
            .collect())
    }
}

#[async_trait]
impl DocumentParser for LlamaParseClient {
    async fn parse(&self, path: &Path, filename: &str) -> Result<Vec<ParsedSection>, ParseError> {
        let bytes = tokio::fs::read(path).await?;
        tracing::info!(filename, bytes = bytes.len(), "Parsing document");

        let job_id = self.upload(bytes, filename).await?;
        tracing::debug!(filename, job_id = %job_id, "Parsing job submitted");
        self.wait_for_job(&job_id).await?;
        let sections = self.fetch_pages(&job_id).await?;
        tracing::info!(filename, job_id = %job_id, sections = sections.len(), "Document parsed");
        Ok(sections)
    }
}

async fn read_json<T>(response: reqwest::Response) -> Result<T, ParseError>
where
    T: for<'de> Deserialize<'de>,
{
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(%status, "LlamaParse request failed");
        Err(ParseError::Rejected { status, body })
    }
}

#[derive(Deserialize)]
struct JobStatus {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct JsonResult {
    #[serde(default)]
    pages: Vec<JsonPage>,
}

#[derive(Deserialize)]
struct JsonPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };
    use serde_json::json;

    fn client(base_url: String) -> LlamaParseClient {
        LlamaParseClient {
            http: Client::builder()
                .user_agent("research-assistant-test")
                .build()
                .expect("client"),
            base_url,
            api_key: "llx-test".into(),
            poll_interval: Duration::from_millis(5),
            poll_timeout: Duration::from_millis(200),
        }
    }

    async fn staged_file(contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("parser-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.expect("temp dir");
        let path = dir.join("paper.txt");
        tokio::fs::write(&path, contents).await.expect("write");
        path
    }

    #[tokio::test]
    async fn uploads_polls_and_returns_pages() {
        let server = MockServer::start_async().await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/parsing/upload")
                    .header("authorization", "Bearer llx-test")
                    .body_contains("paper.txt");
                then.status(200)
                    .json_body(json!({ "id": "job-1", "status": "PENDING" }));
            })
            .await;
        let status = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/parsing/job/job-1");
                then.status(200)
                    .json_body(json!({ "id": "job-1", "status": "SUCCESS" }));
            })
            .await;
        let result = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/parsing/job/job-1/result/json");
                then.status(200).json_body(json!({
                    "pages": [
                        { "page": 1, "text": "Intro", "md": "# Intro" },
                        { "page": 2, "text": "Methods" }
                    ]
                }));
            })
            .await;

        let path = staged_file("raw bytes").await;
        let sections = client(server.base_url())
            .parse(&path, "paper.txt")
            .await
            .expect("parse");

        upload.assert();
        status.assert();
        result.assert();
        assert_eq!(
            sections,
            vec![
                ParsedSection {
                    text: "Intro".into(),
                    page: Some(1)
                },
                ParsedSection {
                    text: "Methods".into(),
                    page: Some(2)
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_job_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/parsing/upload");
                then.status(200)
                    .json_body(json!({ "id": "job-2", "status": "PENDING" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/parsing/job/job-2");
                then.status(200)
                    .json_body(json!({ "id": "job-2", "status": "ERROR" }));
            })
            .await;

        let path = staged_file("raw bytes").await;
        let error = client(server.base_url())
            .parse(&path, "paper.txt")
            .await
            .expect_err("job error");

        assert!(matches!(error, ParseError::JobFailed { status, .. } if status == "ERROR"));
    }

    #[tokio::test]
    async fn pending_job_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/parsing/upload");
                then.status(200)
                    .json_body(json!({ "id": "job-3", "status": "PENDING" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/parsing/job/job-3");
                then.status(200)
                    .json_body(json!({ "id": "job-3", "status": "PENDING" }));
            })
            .await;

        let path = staged_file("raw bytes").await;
        let error = client(server.base_url())
            .parse(&path, "paper.txt")
            .await
            .expect_err("timeout");

        assert!(matches!(error, ParseError::Timeout(job) if job == "job-3"));
    }

    #[tokio::test]
    async fn rejected_upload_carries_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v1/parsing/upload");
                then.status(401).body("bad key");
            })
            .await;

        let path = staged_file("raw bytes").await;
        let error = client(server.base_url())
            .parse(&path, "paper.txt")
            .await
            .expect_err("rejected");

        assert!(matches!(error, ParseError::Rejected { status, .. } if status.as_u16() == 401));
    }
}
