//! The streaming Reason-Act loop: same state machine as
//! [`crate::react_loop`] but chunk-by-chunk, interleaving plain text with
//! [`crate::stream::StreamEventMarker`] events on one `mpsc` channel.

use crate::chat_client::{ChatClient, ChatOptions, PromptSpec, ToolDefinition};
use crate::context::RunContext;
use crate::error::AgentError;
use crate::message_trimmer::MessageTrimmer;
use crate::metrics::AgentMetrics;
use crate::model::{AgentCommand, Message, ResponseFormat, TokenUsage};
use crate::stream::StreamEventMarker;
use crate::tool_orchestrator::ToolCallOrchestrator;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Outcome of a completed streaming run, handed to
/// [`crate::finalize::StreamingCompletionFinalizer`].
pub struct StreamingOutcome {
    pub collected_content: String,
    pub last_iteration_content: String,
    pub token_usage: TokenUsage,
}

pub struct StreamingReActLoop<'a> {
    chat_client: &'a dyn ChatClient,
    trimmer: &'a MessageTrimmer<'a>,
    orchestrator: &'a ToolCallOrchestrator,
    metrics: &'a dyn AgentMetrics,
    max_tool_calls: u32,
    max_context_window_tokens: usize,
    max_output_tokens: usize,
}

impl<'a> StreamingReActLoop<'a> {
    pub fn new(
        chat_client: &'a dyn ChatClient,
        trimmer: &'a MessageTrimmer<'a>,
        orchestrator: &'a ToolCallOrchestrator,
        metrics: &'a dyn AgentMetrics,
        max_tool_calls: u32,
        max_context_window_tokens: usize,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            chat_client,
            trimmer,
            orchestrator,
            metrics,
            max_tool_calls,
            max_context_window_tokens,
            max_output_tokens,
        }
    }

    /// Runs the loop, emitting text chunks and tool markers on `sender` as
    /// they occur, and returns the aggregated outcome once the model
    /// produces a final answer. Forbids non-TEXT `responseFormat`.
    pub async fn run(
        &self,
        context: &RunContext,
        command: &AgentCommand,
        system_prompt: &str,
        mut messages: Vec<Message>,
        mut tool_definitions: Vec<ToolDefinition>,
        sender: &mpsc::Sender<String>,
    ) -> Result<StreamingOutcome, AgentError> {
        if command.response_format != ResponseFormat::Text {
            let marker = StreamEventMarker::Error {
                message: "streaming does not support non-TEXT responseFormat".to_string(),
            };
            let _ = sender.send(marker.encode()).await;
            return Err(AgentError::InvalidResponse(
                "streaming does not support non-TEXT responseFormat".to_string(),
            ));
        }

        let allowed_tools = command.allowed_tools();
        let mut cumulative_usage = TokenUsage::default();
        let mut active_tools = !tool_definitions.is_empty();
        let mut collected_content = String::new();
        let mut last_iteration_content = String::new();

        loop {
            self.trimmer.trim(&mut messages, system_prompt, self.max_context_window_tokens, self.max_output_tokens);

            let options = ChatOptions {
                temperature: command.temperature,
                max_output_tokens: Some(self.max_output_tokens),
                has_tools: active_tools,
                google_search_retrieval: false,
                internal_tool_execution_enabled: false,
            };

            let prompt = PromptSpec {
                system_prompt: Some(system_prompt.to_string()),
                messages: messages.clone(),
                options,
                tools: if active_tools { tool_definitions.clone() } else { Vec::new() },
            };

            let mut chunk_stream = self.chat_client.stream(prompt).await.map_err(AgentError::from)?;

            let mut iteration_text = String::new();
            let mut pending_tool_calls = Vec::new();

            while let Some(chunk) = chunk_stream.next().await {
                let chunk = chunk.map_err(AgentError::from)?;
                if let Some(usage) = chunk.usage {
                    self.metrics.record_llm_call_tokens(usage.prompt_tokens, usage.completion_tokens);
                    cumulative_usage.add(usage);
                }
                if let Some(text) = chunk.text {
                    if !text.is_empty() {
                        iteration_text.push_str(&text);
                        let _ = sender.send(text).await;
                    }
                }
                if !chunk.tool_calls.is_empty() {
                    pending_tool_calls = chunk.tool_calls;
                }
            }

            collected_content.push_str(&iteration_text);
            last_iteration_content = iteration_text.clone();

            if pending_tool_calls.is_empty() || !active_tools {
                return Ok(StreamingOutcome {
                    collected_content,
                    last_iteration_content,
                    token_usage: cumulative_usage,
                });
            }

            for call in &pending_tool_calls {
                let _ = sender.send(StreamEventMarker::ToolStart { name: call.name.clone() }.encode()).await;
            }

            let assistant_message = Message::assistant_with_tool_calls(Some(iteration_text), pending_tool_calls.clone());
            messages.push(assistant_message);

            let responses = self
                .orchestrator
                .dispatch(context, pending_tool_calls.clone(), allowed_tools.as_deref())
                .await;

            for call in &pending_tool_calls {
                let _ = sender.send(StreamEventMarker::ToolEnd { name: call.name.clone() }.encode()).await;
            }

            messages.push(Message::tool_responses(responses));

            if self.orchestrator.total_tool_calls() >= self.max_tool_calls {
                active_tools = false;
                tool_definitions.clear();
            }
        }
    }
}

/// Builds the channel/stream pair the caller consumes while `run` drives
/// production on the sender side.
pub fn new_stream_channel(buffer: usize) -> (mpsc::Sender<String>, ReceiverStream<String>) {
    let (tx, rx) = mpsc::channel(buffer);
    (tx, ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_client::{BoxError, ChatResponse, ChatResponseStream, MessageChunk};
    use crate::context::RunContext;
    use crate::metrics::NoopMetrics;
    use crate::model::{ExecutionMode, ToolCall};
    use crate::token_estimator::ApproximateTokenEstimator;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedStreamClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for ScriptedStreamClient {
        async fn call(&self, _prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
            unreachable!("streaming loop should not call the non-streaming path")
        }

        async fn stream(&self, _prompt: PromptSpec) -> Result<ChatResponseStream, BoxError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            let chunks: Vec<Result<MessageChunk, BoxError>> = if call_number == 0 {
                vec![
                    Ok(MessageChunk { text: Some("thinking...".into()), tool_calls: vec![], usage: None }),
                    Ok(MessageChunk {
                        text: None,
                        tool_calls: vec![ToolCall { id: "1".into(), name: "echo".into(), arguments: serde_json::json!({}) }],
                        usage: None,
                    }),
                ]
            } else {
                vec![Ok(MessageChunk { text: Some("done".into()), tool_calls: vec![], usage: None })]
            };
            Ok(Box::pin(tokio_stream::iter(chunks)))
        }

        fn model_name(&self) -> &str {
            "scripted-stream"
        }
    }

    fn echo_tool() -> Arc<dyn crate::tool::ToolCallback> {
        Arc::new(crate::tool::FunctionTool::new(
            "echo",
            "echoes",
            vec![],
            Arc::new(|args: serde_json::Value| Box::pin(async move { Ok(args) })),
        ))
    }

    #[tokio::test]
    async fn streams_text_and_dispatches_tool_before_final_answer() {
        let client = ScriptedStreamClient { calls: AtomicUsize::new(0) };
        let estimator = ApproximateTokenEstimator;
        let trimmer = MessageTrimmer::new(&estimator);
        let orchestrator = ToolCallOrchestrator::new(
            vec![echo_tool()],
            100,
            std::time::Duration::from_millis(500),
            Arc::new(NoopMetrics),
            Arc::new(AtomicU32::new(0)),
        );
        let loop_runner = StreamingReActLoop::new(&client, &trimmer, &orchestrator, &NoopMetrics, 100, 100_000, 1000);
        let command = AgentCommand::new("sys", "hi").with_mode(ExecutionMode::Streaming);
        let context = RunContext::new("u1", "hi", HashMap::new());
        let tool_defs = vec![ToolDefinition { name: "echo".into(), description: "echoes".into(), input_schema: "{}".into() }];
        let (tx, mut rx) = new_stream_channel(16);

        let outcome = loop_runner
            .run(&context, &command, "sys", vec![Message::user("hi")], tool_defs, &tx)
            .await
            .unwrap();

        assert_eq!(outcome.last_iteration_content, "done");
        assert!(outcome.collected_content.contains("thinking"));

        drop(tx);
        let mut received = Vec::new();
        while let Some(item) = rx.next().await {
            received.push(item);
        }
        assert!(received.iter().any(|s| crate::stream::parse(s).map(|m| matches!(m, StreamEventMarker::ToolStart { .. })).unwrap_or(false)));
    }

    #[tokio::test]
    async fn non_text_response_format_is_rejected() {
        let client = ScriptedStreamClient { calls: AtomicUsize::new(0) };
        let estimator = ApproximateTokenEstimator;
        let trimmer = MessageTrimmer::new(&estimator);
        let orchestrator = ToolCallOrchestrator::new(vec![], 100, std::time::Duration::from_millis(500), Arc::new(NoopMetrics), Arc::new(AtomicU32::new(0)));
        let loop_runner = StreamingReActLoop::new(&client, &trimmer, &orchestrator, &NoopMetrics, 100, 100_000, 1000);
        let command = AgentCommand::new("sys", "hi").with_response_format(ResponseFormat::Json);
        let context = RunContext::new("u1", "hi", HashMap::new());
        let (tx, _rx) = new_stream_channel(16);

        let result = loop_runner.run(&context, &command, "sys", vec![], vec![], &tx).await;
        assert!(result.is_err());
    }
}
