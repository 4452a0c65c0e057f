//! Agent invocation capability: role-tagged requests answered by a language model.
//!
//! An agent request carries ordered instructions, the tools the model may call, and the user
//! input. [`AgentInvoker`] answers either in one piece or as an ordered stream of text
//! fragments whose concatenation equals the batch answer.

mod chat;
pub mod tools;

pub use chat::ChatAgent;
pub use tools::{DocumentTool, ThinkTool, Tool, WebSearchTool};

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Stage an agent plays in a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Drafts the step-by-step plan.
    Planner,
    /// Follows the plan using tools.
    Executor,
    /// Writes the final report.
    Reporter,
}

impl AgentRole {
    /// Lowercase label used in logs and stream events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Executor => "executor",
            Self::Reporter => "reporter",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent invocation.
#[derive(Clone)]
pub struct AgentRequest {
    /// Stage being executed.
    pub role: AgentRole,
    /// Ordered instruction lines, sent as the system prompt.
    pub instructions: Vec<String>,
    /// Tools the model may call; empty for tool-less stages.
    pub tools: Vec<Arc<dyn Tool>>,
    /// User input for this invocation.
    pub input: String,
}

impl fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRequest")
            .field("role", &self.role)
            .field("instructions", &self.instructions)
            .field(
                "tools",
                &self.tools.iter().map(|tool| tool.name()).collect::<Vec<_>>(),
            )
            .field("input", &self.input)
            .finish()
    }
}

/// Errors raised while invoking an agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model endpoint could not be reached or rejected the request.
    #[error("Model request failed: {0}")]
    Model(#[from] async_openai::error::OpenAIError),
    /// Provider answered but the answer was unusable.
    #[error("Agent provider error: {0}")]
    Provider(String),
}

/// Ordered text fragments produced by a streaming invocation.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Interface implemented by agent backends.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the request to completion and return the full answer.
    async fn invoke(&self, request: AgentRequest) -> Result<String, AgentError>;

    /// Run the request, yielding answer fragments as they are produced.
    ///
    /// Dropping the stream abandons the invocation.
    fn invoke_streaming(&self, request: AgentRequest) -> FragmentStream;
}
