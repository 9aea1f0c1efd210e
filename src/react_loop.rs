//! The non-streaming Reason-Act loop: repeated LLM calls interleaved with
//! parallel tool dispatch until the model produces a final textual answer
//! or the tool-call cap is reached.

use crate::chat_client::{ChatClient, ChatOptions, PromptSpec, ToolDefinition};
use crate::context::RunContext;
use crate::error::AgentError;
use crate::message_trimmer::MessageTrimmer;
use crate::metrics::AgentMetrics;
use crate::model::{AgentCommand, Message, TokenUsage};
use crate::retry::RetryExecutor;
use crate::structured_output::validate_or_repair;
use crate::tool_orchestrator::ToolCallOrchestrator;

/// Outcome of a completed (non-streaming) loop run, ready for
/// [`crate::finalize`] to apply output guards and boundaries to.
pub struct ReActOutcome {
    pub content: String,
    pub token_usage: TokenUsage,
}

pub struct ManualReActLoop<'a> {
    chat_client: &'a dyn ChatClient,
    retry: &'a RetryExecutor<'a>,
    trimmer: &'a MessageTrimmer<'a>,
    orchestrator: &'a ToolCallOrchestrator,
    metrics: &'a dyn AgentMetrics,
    max_tool_calls: u32,
    max_context_window_tokens: usize,
    max_output_tokens: usize,
}

impl<'a> ManualReActLoop<'a> {
    pub fn new(
        chat_client: &'a dyn ChatClient,
        retry: &'a RetryExecutor<'a>,
        trimmer: &'a MessageTrimmer<'a>,
        orchestrator: &'a ToolCallOrchestrator,
        metrics: &'a dyn AgentMetrics,
        max_tool_calls: u32,
        max_context_window_tokens: usize,
        max_output_tokens: usize,
    ) -> Self {
        Self {
            chat_client,
            retry,
            trimmer,
            orchestrator,
            metrics,
            max_tool_calls,
            max_context_window_tokens,
            max_output_tokens,
        }
    }

    pub async fn run(
        &self,
        context: &RunContext,
        command: &AgentCommand,
        system_prompt: &str,
        mut messages: Vec<Message>,
        mut tool_definitions: Vec<ToolDefinition>,
    ) -> Result<ReActOutcome, AgentError> {
        let allowed_tools = command.allowed_tools();
        let mut cumulative_usage = TokenUsage::default();
        let mut active_tools = !tool_definitions.is_empty();

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

            let response = self
                .retry
                .execute(|| async {
                    self.chat_client
                        .call(prompt.clone())
                        .await
                        .map_err(AgentError::from)
                })
                .await?;

            if let Some(usage) = response.usage {
                self.metrics.record_llm_call_tokens(usage.prompt_tokens, usage.completion_tokens);
                cumulative_usage.add(usage);
            }

            if response.tool_calls.is_empty() || !active_tools {
                let content = response.text.unwrap_or_default();
                let validated = validate_or_repair(self.chat_client, command.response_format, &content).await?;
                return Ok(ReActOutcome {
                    content: validated,
                    token_usage: cumulative_usage,
                });
            }

            let assistant_message = Message::assistant_with_tool_calls(response.text.clone(), response.tool_calls.clone());
            messages.push(assistant_message);

            let responses = self
                .orchestrator
                .dispatch(context, response.tool_calls, allowed_tools.as_deref())
                .await;
            messages.push(Message::tool_responses(responses));

            if self.orchestrator.total_tool_calls() >= self.max_tool_calls {
                active_tools = false;
                tool_definitions.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_client::{BoxError, ChatResponse};
    use crate::context::RunContext;
    use crate::metrics::NoopMetrics;
    use crate::model::{ExecutionMode, ToolCall};
    use crate::token_estimator::ApproximateTokenEstimator;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct ScriptedClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn call(&self, prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            if call_number == 0 {
                assert!(prompt.options.has_tools);
                Ok(ChatResponse {
                    text: None,
                    tool_calls: vec![ToolCall {
                        id: "1".into(),
                        name: "echo".into(),
                        arguments: serde_json::json!({"x": 1}),
                    }],
                    usage: Some(TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 }),
                })
            } else {
                Ok(ChatResponse {
                    text: Some("final answer".into()),
                    tool_calls: vec![],
                    usage: Some(TokenUsage { prompt_tokens: 8, completion_tokens: 4, total_tokens: 12 }),
                })
            }
        }

        fn model_name(&self) -> &str {
            "scripted"
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
    async fn loop_dispatches_tool_then_returns_final_text() {
        let client = ScriptedClient { calls: AtomicUsize::new(0) };
        let retry = RetryExecutor::new(1, Duration::from_millis(1), 1.0, Duration::from_millis(5));
        let estimator = ApproximateTokenEstimator;
        let trimmer = MessageTrimmer::new(&estimator);
        let orchestrator = ToolCallOrchestrator::new(
            vec![echo_tool()],
            100,
            Duration::from_millis(500),
            Arc::new(NoopMetrics),
            Arc::new(AtomicU32::new(0)),
        );

        let react_loop = ManualReActLoop::new(&client, &retry, &trimmer, &orchestrator, &NoopMetrics, 100, 100_000, 1000);
        let command = AgentCommand::new("sys", "hi").with_mode(ExecutionMode::React);
        let context = RunContext::new("u1", "hi", HashMap::new());
        let tool_defs = vec![ToolDefinition { name: "echo".into(), description: "echoes".into(), input_schema: "{}".into() }];

        let outcome = react_loop
            .run(&context, &command, "sys", vec![Message::user("hi")], tool_defs)
            .await
            .unwrap();

        assert_eq!(outcome.content, "final answer");
        assert_eq!(outcome.token_usage.total_tokens, 27);
    }
}
