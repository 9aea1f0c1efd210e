//! The `ChatClient` boundary: the external LLM collaborator this core
//! drives but does not implement.
//!
//! Generalizes `cloudllm::client_wrapper::ClientWrapper` — same shape
//! (`send_message`, an optional streaming variant, `model_name`) — into a
//! provider-agnostic trait that takes a `PromptSpec` carrying tools and
//! `ChatOptions`, since the concrete per-provider clients
//! (`OpenAIClient`/`GeminiClient`/...) are out of this core's scope.

use crate::model::{Message, TokenUsage, ToolCall};
use async_trait::async_trait;
use std::error::Error;
use tokio_stream::Stream;

/// Provider-agnostic knobs threaded through to the `ChatClient`.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<usize>,
    pub has_tools: bool,
    pub google_search_retrieval: bool,
    pub internal_tool_execution_enabled: bool,
}

/// A tool definition as surfaced to the LLM, produced by
/// [`crate::tool::wrap_as_definition`].
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: String,
}

/// Everything one LLM call needs: history, options, and the active tool
/// surface. Tool-aware options imply the provider must not execute tools
/// itself — this core owns dispatch.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub options: ChatOptions,
    pub tools: Vec<ToolDefinition>,
}

/// One complete LLM response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

/// One chunk of a streamed LLM response. A chunk carries text, a final
/// pending tool-call set, or both are absent on a pure keep-alive chunk.
#[derive(Debug, Clone, Default)]
pub struct MessageChunk {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

pub type BoxError = Box<dyn Error + Send + Sync>;
pub type ChatResponseStream = std::pin::Pin<Box<dyn Stream<Item = Result<MessageChunk, BoxError>> + Send>>;

/// The external, consumed LLM collaborator.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn call(&self, prompt: PromptSpec) -> Result<ChatResponse, BoxError>;

    /// Streaming variant. Default implementation returns `Unsupported` so
    /// clients that only support non-streaming calls can skip it, matching
    /// `ClientWrapper::send_message_stream`'s no-op default.
    async fn stream(&self, _prompt: PromptSpec) -> Result<ChatResponseStream, BoxError> {
        Err("streaming not supported by this ChatClient".into())
    }

    fn model_name(&self) -> &str;
}
