//! Plan-execute-report orchestration in batch and streaming form.

use super::events::ProgressEvent;
use super::prompts::{executor_instructions, planner_instructions, reporter_instructions};
use crate::agent::{
    AgentError, AgentInvoker, AgentRequest, AgentRole, DocumentTool, ThinkTool, Tool,
    WebSearchTool,
};
use crate::embedding::EmbeddingClient;
use crate::metrics::ServiceMetrics;
use crate::retrieval::DocumentRetriever;
use crate::search::WebSearch;
use crate::store::VectorStore;
use async_stream::{stream, try_stream};
use futures_core::Stream;
use futures_util::{StreamExt, pin_mut};
use std::sync::Arc;
use thiserror::Error;

/// Errors that abort a research run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An agent stage failed; later stages never ran.
    #[error("{stage} stage failed: {source}")]
    Stage {
        /// Stage that failed.
        stage: AgentRole,
        /// Underlying agent failure.
        #[source]
        source: AgentError,
    },
}

impl PipelineError {
    fn stage(stage: AgentRole) -> impl FnOnce(AgentError) -> Self {
        move |source| Self::Stage { stage, source }
    }
}

/// Texts produced by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOutcome {
    /// Planner output.
    pub plan: String,
    /// Executor output.
    pub execution: String,
    /// Final report.
    pub report: String,
}

/// Runs the three research stages against one document namespace.
///
/// Stages run strictly in order and each stage's instructions embed the full output of the
/// stages before it. Nothing is shared between runs.
#[derive(Clone)]
pub struct ResearchPipeline {
    agent: Arc<dyn AgentInvoker>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    web_search: Arc<dyn WebSearch>,
    metrics: Arc<ServiceMetrics>,
}

impl ResearchPipeline {
    /// Assemble the pipeline from its capabilities.
    pub fn new(
        agent: Arc<dyn AgentInvoker>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        web_search: Arc<dyn WebSearch>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            agent,
            embedder,
            store,
            web_search,
            metrics,
        }
    }

    fn executor_tools(&self, namespace: &str) -> Vec<Arc<dyn Tool>> {
        let retriever =
            DocumentRetriever::new(self.embedder.clone(), self.store.clone(), namespace);
        vec![
            Arc::new(ThinkTool),
            Arc::new(DocumentTool::new(retriever)),
            Arc::new(WebSearchTool::new(self.web_search.clone())),
        ]
    }

    fn planner_request(&self, prompt: &str) -> AgentRequest {
        AgentRequest {
            role: AgentRole::Planner,
            instructions: planner_instructions(prompt),
            tools: Vec::new(),
            input: prompt.to_string(),
        }
    }

    fn executor_request(&self, prompt: &str, namespace: &str, plan: &str) -> AgentRequest {
        AgentRequest {
            role: AgentRole::Executor,
            instructions: executor_instructions(prompt, plan),
            tools: self.executor_tools(namespace),
            input: prompt.to_string(),
        }
    }

    fn reporter_request(&self, prompt: &str, plan: &str, execution: &str) -> AgentRequest {
        AgentRequest {
            role: AgentRole::Reporter,
            instructions: reporter_instructions(prompt, plan, execution),
            tools: Vec::new(),
            input: prompt.to_string(),
        }
    }

    async fn invoke_stage(&self, request: AgentRequest) -> Result<String, PipelineError> {
        let stage = request.role;
        tracing::info!(stage = %stage, "Running stage");
        let output = self
            .agent
            .invoke(request)
            .await
            .map_err(PipelineError::stage(stage))?;
        tracing::debug!(stage = %stage, output = %output, "Stage finished");
        Ok(output)
    }

    /// Run all three stages and return their outputs.
    pub async fn run(&self, prompt: &str, namespace: &str) -> Result<ResearchOutcome, PipelineError> {
        let result = self.run_stages(prompt, namespace).await;
        self.metrics.record_query(result.is_ok());
        if let Err(error) = &result {
            tracing::error!(namespace, %error, "Research run failed");
        }
        result
    }

    async fn run_stages(&self, prompt: &str, namespace: &str) -> Result<ResearchOutcome, PipelineError> {
        tracing::info!(namespace, "Starting research run");
        let plan = self.invoke_stage(self.planner_request(prompt)).await?;
        let execution = self
            .invoke_stage(self.executor_request(prompt, namespace, &plan))
            .await?;
        let report = self
            .invoke_stage(self.reporter_request(prompt, &plan, &execution))
            .await?;
        tracing::info!(namespace, report_len = report.len(), "Research run complete");
        Ok(ResearchOutcome {
            plan,
            execution,
            report,
        })
    }

    /// Run all three stages, reporting progress and forwarding every fragment as it arrives.
    ///
    /// The stream ends with exactly one `complete` or `error` event. Dropping it stops the run.
    pub fn run_stream(
        &self,
        prompt: String,
        namespace: String,
    ) -> impl Stream<Item = ProgressEvent> + Send + use<> {
        let pipeline = self.clone();
        stream! {
            let mut guard = RunGuard::new(namespace.clone(), pipeline.metrics.clone());
            let events = pipeline.stream_stages(prompt, namespace);
            pin_mut!(events);

            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.is_terminal() {
                            guard.finish(true);
                        }
                        yield event;
                    }
                    Err(error) => {
                        guard.finish(false);
                        tracing::error!(namespace = %guard.namespace, %error, "Research stream failed");
                        yield ProgressEvent::Error { message: error.to_string() };
                        break;
                    }
                }
            }
        }
    }

    fn stream_stages(
        &self,
        prompt: String,
        namespace: String,
    ) -> impl Stream<Item = Result<ProgressEvent, PipelineError>> + Send + use<> {
        let pipeline = self.clone();
        try_stream! {
            tracing::info!(namespace = %namespace, "Starting streaming research run");
            yield ProgressEvent::checkpoint(0);

            tracing::info!(stage = "planner", "Running stage");
            let mut plan = String::new();
            let mut fragments = pipeline.agent.invoke_streaming(pipeline.planner_request(&prompt));
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment.map_err(PipelineError::stage(AgentRole::Planner))?;
                plan.push_str(&fragment);
                yield ProgressEvent::AgentContent { content: fragment, agent: AgentRole::Planner };
            }
            tracing::debug!(stage = "planner", output = %plan, "Stage finished");

            yield ProgressEvent::checkpoint(1);
            yield ProgressEvent::checkpoint(2);

            tracing::info!(stage = "executor", "Running stage");
            let mut execution = String::new();
            let mut fragments = pipeline
                .agent
                .invoke_streaming(pipeline.executor_request(&prompt, &namespace, &plan));
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment.map_err(PipelineError::stage(AgentRole::Executor))?;
                execution.push_str(&fragment);
                yield ProgressEvent::AgentContent { content: fragment, agent: AgentRole::Executor };
            }
            tracing::debug!(stage = "executor", output = %execution, "Stage finished");

            yield ProgressEvent::checkpoint(3);
            yield ProgressEvent::checkpoint(4);

            tracing::info!(stage = "reporter", "Running stage");
            let mut report = String::new();
            let mut fragments = pipeline
                .agent
                .invoke_streaming(pipeline.reporter_request(&prompt, &plan, &execution));
            while let Some(fragment) = fragments.next().await {
                let fragment = fragment.map_err(PipelineError::stage(AgentRole::Reporter))?;
                report.push_str(&fragment);
                yield ProgressEvent::ReportDelta { content: fragment };
            }

            tracing::info!(namespace = %namespace, report_len = report.len(), "Streaming research run complete");
            yield ProgressEvent::complete(report);
        }
    }
}

/// Records how a streaming run ended, counting runs whose stream was dropped early.
struct RunGuard {
    namespace: String,
    metrics: Arc<ServiceMetrics>,
    finished: bool,
}

impl RunGuard {
    fn new(namespace: String, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            namespace,
            metrics,
            finished: false,
        }
    }

    fn finish(&mut self, succeeded: bool) {
        self.finished = true;
        self.metrics.record_query(succeeded);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.metrics.record_cancelled_query();
            tracing::info!(namespace = %self.namespace, "Research stream dropped by caller");
        }
    }
}
