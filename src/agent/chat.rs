//! OpenAI-compatible chat completion agent with a bounded tool-call loop.

use super::{AgentError, AgentInvoker, AgentRequest, FragmentStream, Tool};
use crate::config::Config;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
};
use async_stream::try_stream;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use futures_util::StreamExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Chat agent speaking the OpenAI `/chat/completions` protocol (NVIDIA NIM by default).
///
/// Each invocation alternates model calls and tool executions until the model answers without
/// requesting tools. The round after `max_tool_rounds` tool rounds is sent without tools, which
/// forces a final answer.
#[derive(Clone)]
pub struct ChatAgent {
    client: Client<OpenAIConfig>,
    model: String,
    max_tool_rounds: usize,
}

impl ChatAgent {
    /// Build an agent from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.llm_base_url,
            &config.nvidia_api_key,
            &config.llm_model,
            config.agent_max_tool_rounds,
        )
    }

    fn new(base_url: &str, api_key: &str, model: &str, max_tool_rounds: usize) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url.trim_end_matches('/'))
            .with_api_key(api_key);
        // Upstream faults surface to the caller on the first failure.
        let no_retries = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_retries),
            model: model.to_string(),
            max_tool_rounds,
        }
    }

    fn build_request(
        &self,
        messages: &[ChatCompletionRequestMessage],
        tools: &[Arc<dyn Tool>],
    ) -> Result<CreateChatCompletionRequest, AgentError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages.to_vec());
        if !tools.is_empty() {
            args.tools(tool_definitions(tools)?)
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }
        Ok(args.build()?)
    }

    /// Tools offered in `round`; the last permitted round offers none.
    fn tools_for_round<'a>(&self, request: &'a AgentRequest, round: usize) -> &'a [Arc<dyn Tool>] {
        if round < self.max_tool_rounds {
            &request.tools
        } else {
            &[]
        }
    }

    fn log_failure(&self, error: &async_openai::error::OpenAIError) {
        tracing::error!(%error, model = %self.model, "Chat completion failed");
    }
}

fn tool_definitions(tools: &[Arc<dyn Tool>]) -> Result<Vec<ChatCompletionTool>, AgentError> {
    tools
        .iter()
        .map(|tool| -> Result<ChatCompletionTool, AgentError> {
            let function = FunctionObjectArgs::default()
                .name(tool.name())
                .description(tool.description())
                .parameters(tool.parameters())
                .build()?;
            Ok(ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()?)
        })
        .collect()
}

fn initial_messages(request: &AgentRequest) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(request.instructions.join("\n"))
            .build()?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(request.input.clone())
            .build()?
            .into(),
    ])
}

fn assistant_tool_message(
    content: &str,
    calls: &[ChatCompletionMessageToolCall],
) -> Result<ChatCompletionRequestMessage, AgentError> {
    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
    args.tool_calls(calls.to_vec());
    if !content.is_empty() {
        args.content(content.to_string());
    }
    Ok(args.build()?.into())
}

/// Execute each call in order and append its result as a `tool` message.
async fn run_tools(
    request: &AgentRequest,
    calls: &[ChatCompletionMessageToolCall],
    messages: &mut Vec<ChatCompletionRequestMessage>,
) -> Result<(), AgentError> {
    for call in calls {
        let result = run_tool(&request.tools, &call.function).await;
        tracing::debug!(
            stage = %request.role,
            tool = %call.function.name,
            result_len = result.len(),
            "Tool finished"
        );
        messages.push(
            ChatCompletionRequestToolMessageArgs::default()
                .content(result)
                .tool_call_id(call.id.clone())
                .build()?
                .into(),
        );
    }
    Ok(())
}

async fn run_tool(tools: &[Arc<dyn Tool>], call: &FunctionCall) -> String {
    let Some(tool) = tools.iter().find(|tool| tool.name() == call.name) else {
        tracing::warn!(tool = %call.name, "Model requested an unknown tool");
        return format!("Unknown tool: {}", call.name);
    };
    let arguments = if call.arguments.trim().is_empty() {
        json!({})
    } else {
        match serde_json::from_str(&call.arguments) {
            Ok(arguments) => arguments,
            Err(error) => return format!("Invalid arguments for {}: {error}", call.name),
        }
    };
    tracing::info!(tool = %call.name, "Running tool");
    tool.call(arguments).await
}

#[derive(Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Merges streamed `tool_calls` deltas by index.
#[derive(Default)]
struct ToolCallAssembler {
    calls: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAssembler {
    fn push(&mut self, chunk: ChatCompletionMessageToolCallChunk) {
        let entry = self.calls.entry(chunk.index).or_default();
        if let Some(id) = chunk.id {
            entry.id = Some(id);
        }
        if let Some(function) = chunk.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    /// Completed calls ordered by index; calls without a name are dropped.
    fn finish(self) -> Vec<ChatCompletionMessageToolCall> {
        self.calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .enumerate()
            .map(|(position, call)| ChatCompletionMessageToolCall {
                id: call.id.unwrap_or_else(|| format!("call_{position}")),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: call.name,
                    arguments: call.arguments,
                },
            })
            .collect()
    }
}

#[async_trait]
impl AgentInvoker for ChatAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<String, AgentError> {
        let mut messages = initial_messages(&request)?;
        let mut answer = String::new();

        for round in 0..=self.max_tool_rounds {
            let tools = self.tools_for_round(&request, round);
            let body = self.build_request(&messages, tools)?;
            let response = self
                .client
                .chat()
                .create(body)
                .await
                .inspect_err(|error| self.log_failure(error))?;
            let message = response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or_else(|| AgentError::Provider("completion had no choices".into()))?;

            let content = message.content.unwrap_or_default();
            answer.push_str(&content);
            let calls = message.tool_calls.unwrap_or_default();
            if calls.is_empty() || tools.is_empty() {
                break;
            }

            tracing::debug!(stage = %request.role, round, calls = calls.len(), "Model requested tools");
            messages.push(assistant_tool_message(&content, &calls)?);
            run_tools(&request, &calls, &mut messages).await?;
        }

        Ok(answer)
    }

    fn invoke_streaming(&self, request: AgentRequest) -> FragmentStream {
        let agent = self.clone();
        Box::pin(try_stream! {
            let mut messages = initial_messages(&request)?;

            for round in 0..=agent.max_tool_rounds {
                let tools = agent.tools_for_round(&request, round);
                let body = agent.build_request(&messages, tools)?;
                let mut chunks = agent
                    .client
                    .chat()
                    .create_stream(body)
                    .await
                    .inspect_err(|error| agent.log_failure(error))?;

                let mut assembler = ToolCallAssembler::default();
                let mut content = String::new();
                while let Some(chunk) = chunks.next().await {
                    let chunk = chunk.inspect_err(|error| agent.log_failure(error))?;
                    for choice in chunk.choices {
                        for delta in choice.delta.tool_calls.unwrap_or_default() {
                            assembler.push(delta);
                        }
                        if let Some(fragment) = choice.delta.content
                            && !fragment.is_empty()
                        {
                            content.push_str(&fragment);
                            yield fragment;
                        }
                    }
                }

                let calls = assembler.finish();
                if calls.is_empty() || tools.is_empty() {
                    break;
                }

                tracing::debug!(stage = %request.role, round, calls = calls.len(), "Model requested tools");
                messages.push(assistant_tool_message(&content, &calls)?);
                run_tools(&request, &calls, &mut messages).await?;
            }
        })
    }
}
