//! Turns a candidate LLM result into the final `AgentResult` (non-streaming)
//! or drives the equivalent tail of a streaming run: output guard,
//! boundary enforcement, response filtering, history persistence and the
//! after-complete hook.

use crate::chat_client::{ChatClient, ChatOptions, PromptSpec};
use crate::config::{BoundariesConfig, OutputMinViolationMode};
use crate::context::RunContext;
use crate::hook::{run_after_complete_hooks, AfterAgentCompleteHook};
use crate::memory::ConversationManager;
use crate::metrics::AgentMetrics;
use crate::model::{AgentResult, Message, TokenUsage};
use crate::output_guard::{run_output_guard_pipeline, OutputGuardResult, OutputGuardStage};
use crate::stream::StreamEventMarker;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// A fail-open, order-applied transform over the final content.
pub trait ResponseFilter: Send + Sync {
    fn apply(&self, content: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

fn apply_response_filters(filters: &[Arc<dyn ResponseFilter>], content: String) -> String {
    let mut current = content;
    for filter in filters {
        match filter.apply(&current) {
            Ok(next) => current = next,
            Err(err) => {
                log::warn!("response filter failed, keeping prior content: {err}");
            }
        }
    }
    current
}

/// Truncates/pads `content` per `boundaries`. `retry` is invoked at most
/// once, only when the content is shorter than `output_min_chars` and the
/// policy is `RetryOnce`; it should ask the model for a longer answer and
/// return its text.
async fn enforce_boundaries<F, Fut>(
    content: String,
    boundaries: &BoundariesConfig,
    retry: F,
) -> (String, Option<&'static str>)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Option<String>>,
{
    let mut content = content;
    let mut violation = None;

    if boundaries.output_max_chars > 0 && content.chars().count() > boundaries.output_max_chars {
        content = content.chars().take(boundaries.output_max_chars).collect::<String>();
        content.push_str("\n\n[Response truncated]");
        violation = Some("output_max_chars");
    }

    if boundaries.output_min_chars > 0 && content.chars().count() < boundaries.output_min_chars {
        match boundaries.output_min_violation_mode {
            OutputMinViolationMode::Warn => {
                log::warn!(
                    "response shorter than output_min_chars ({} < {})",
                    content.chars().count(),
                    boundaries.output_min_chars
                );
                violation = Some("output_min_chars");
            }
            OutputMinViolationMode::RetryOnce => {
                violation = Some("output_min_chars");
                if let Some(longer) = retry().await {
                    if longer.chars().count() >= boundaries.output_min_chars {
                        content = longer;
                    }
                }
            }
            OutputMinViolationMode::Fail => {
                violation = Some("output_min_chars_fail");
            }
        }
    }

    (content, violation)
}

pub struct ExecutionResultFinalizer {
    output_guard_stages: Vec<Arc<dyn OutputGuardStage>>,
    boundaries: BoundariesConfig,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
    conversation: Arc<ConversationManager>,
    after_complete_hooks: Vec<Arc<dyn AfterAgentCompleteHook>>,
    metrics: Arc<dyn AgentMetrics>,
}

impl ExecutionResultFinalizer {
    pub fn new(
        output_guard_stages: Vec<Arc<dyn OutputGuardStage>>,
        boundaries: BoundariesConfig,
        response_filters: Vec<Arc<dyn ResponseFilter>>,
        conversation: Arc<ConversationManager>,
        after_complete_hooks: Vec<Arc<dyn AfterAgentCompleteHook>>,
        metrics: Arc<dyn AgentMetrics>,
    ) -> Self {
        Self {
            output_guard_stages,
            boundaries,
            response_filters,
            conversation,
            after_complete_hooks,
            metrics,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn finalize(
        &self,
        context: &RunContext,
        session_id: &str,
        user_message: &Message,
        candidate_content: String,
        tools_used: Vec<String>,
        token_usage: Option<TokenUsage>,
        started: Instant,
        chat_client: &dyn ChatClient,
        user_prompt: &str,
    ) -> AgentResult {
        let guard_outcome = run_output_guard_pipeline(&self.output_guard_stages, &candidate_content).await;
        let content = match guard_outcome {
            OutputGuardResult::Allowed => candidate_content,
            OutputGuardResult::Modified { content, .. } => {
                self.metrics.record_output_guard_action("modified");
                content
            }
            OutputGuardResult::Rejected { reason, stage } => {
                self.metrics.record_output_guard_action("rejected");
                let error = crate::error::AgentError::OutputGuardRejected { stage, reason };
                let duration_ms = started.elapsed().as_millis() as u64;
                run_after_complete_hooks(&self.after_complete_hooks, context, false, None).await;
                self.metrics.record_execution(false, duration_ms, Some(error.code().as_str()));
                return AgentResult::failure(&error, duration_ms);
            }
        };

        let (content, violation) = enforce_boundaries(content, &self.boundaries, || async {
            let prompt = PromptSpec {
                system_prompt: Some(format!(
                    "The previous response was too short. Provide a more complete answer to: {user_prompt}"
                )),
                messages: vec![Message::user(user_prompt.to_string())],
                options: ChatOptions::default(),
                tools: Vec::new(),
            };
            chat_client.call(prompt).await.ok().and_then(|r| r.text)
        })
        .await;

        if violation == Some("output_min_chars_fail") {
            let error = crate::error::AgentError::OutputTooShort;
            let duration_ms = started.elapsed().as_millis() as u64;
            run_after_complete_hooks(&self.after_complete_hooks, context, false, None).await;
            self.metrics.record_execution(false, duration_ms, Some(error.code().as_str()));
            return AgentResult::failure(&error, duration_ms);
        }

        let content = apply_response_filters(&self.response_filters, content);

        self.conversation
            .save_turn(session_id, user_message, &Message::assistant_text(content.clone()))
            .await;

        run_after_complete_hooks(&self.after_complete_hooks, context, true, Some(&content)).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_execution(true, duration_ms, None);

        let mut result = AgentResult::success(content, tools_used, duration_ms);
        if let Some(usage) = token_usage {
            result = result.with_token_usage(usage);
        }
        result
    }
}

/// Tail of a streaming run: output guard + boundary reporting over the
/// aggregated content, last-iteration-only history save, after-complete
/// hook, and metrics. `RetryOnce` degrades to `Warn` since a streamed
/// response has already reached the consumer.
pub struct StreamingCompletionFinalizer {
    output_guard_stages: Vec<Arc<dyn OutputGuardStage>>,
    boundaries: BoundariesConfig,
    conversation: Arc<ConversationManager>,
    after_complete_hooks: Vec<Arc<dyn AfterAgentCompleteHook>>,
    metrics: Arc<dyn AgentMetrics>,
}

impl StreamingCompletionFinalizer {
    pub fn new(
        output_guard_stages: Vec<Arc<dyn OutputGuardStage>>,
        boundaries: BoundariesConfig,
        conversation: Arc<ConversationManager>,
        after_complete_hooks: Vec<Arc<dyn AfterAgentCompleteHook>>,
        metrics: Arc<dyn AgentMetrics>,
    ) -> Self {
        Self {
            output_guard_stages,
            boundaries,
            conversation,
            after_complete_hooks,
            metrics,
        }
    }

    pub async fn finalize(
        &self,
        context: &RunContext,
        session_id: &str,
        user_message: &Message,
        collected_content: String,
        last_iteration_content: String,
        started: Instant,
        sender: &mpsc::Sender<String>,
    ) -> bool {
        let guard_outcome = run_output_guard_pipeline(&self.output_guard_stages, &collected_content).await;
        let success = match guard_outcome {
            OutputGuardResult::Allowed => true,
            OutputGuardResult::Modified { reason, .. } => {
                self.metrics.record_output_guard_action("modified");
                let _ = sender.send(StreamEventMarker::Error { message: reason }.encode()).await;
                true
            }
            OutputGuardResult::Rejected { reason, .. } => {
                self.metrics.record_output_guard_action("rejected");
                let _ = sender.send(StreamEventMarker::Error { message: reason }.encode()).await;
                false
            }
        };

        if self.boundaries.output_max_chars > 0 && collected_content.chars().count() > self.boundaries.output_max_chars {
            let _ = sender
                .send(StreamEventMarker::Error { message: "response exceeded output_max_chars".to_string() }.encode())
                .await;
        }
        if self.boundaries.output_min_chars > 0 && collected_content.chars().count() < self.boundaries.output_min_chars {
            log::warn!("streamed response shorter than output_min_chars; RetryOnce degrades to Warn in streaming");
        }

        self.conversation
            .save_turn(session_id, user_message, &Message::assistant_text(last_iteration_content))
            .await;

        run_after_complete_hooks(
            &self.after_complete_hooks,
            context,
            success,
            if success { Some(collected_content.as_str()) } else { None },
        )
        .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_execution(success, duration_ms, None);
        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_client::BoxError;
    use crate::chat_client::ChatResponse;
    use crate::metrics::NoopMetrics;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct UnreachableClient;
    #[async_trait]
    impl ChatClient for UnreachableClient {
        async fn call(&self, _prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
            panic!("should not be called when boundaries are satisfied")
        }
        fn model_name(&self) -> &str {
            "unreachable"
        }
    }

    #[tokio::test]
    async fn truncates_over_max_chars() {
        let finalizer = ExecutionResultFinalizer::new(
            vec![],
            BoundariesConfig { output_max_chars: 5, ..BoundariesConfig::default() },
            vec![],
            Arc::new(ConversationManager::new(None)),
            vec![],
            Arc::new(NoopMetrics),
        );
        let context = RunContext::new("u1", "hi", HashMap::new());
        let result = finalizer
            .finalize(&context, "s1", &Message::user("hi"), "abcdefgh".to_string(), vec![], None, Instant::now(), &UnreachableClient, "hi")
            .await;
        assert!(result.content.unwrap().contains("[Response truncated]"));
    }

    #[tokio::test]
    async fn fail_policy_returns_output_too_short() {
        let finalizer = ExecutionResultFinalizer::new(
            vec![],
            BoundariesConfig {
                output_min_chars: 100,
                output_min_violation_mode: crate::config::OutputMinViolationMode::Fail,
                ..BoundariesConfig::default()
            },
            vec![],
            Arc::new(ConversationManager::new(None)),
            vec![],
            Arc::new(NoopMetrics),
        );
        let context = RunContext::new("u1", "hi", HashMap::new());
        let result = finalizer
            .finalize(&context, "s1", &Message::user("hi"), "short".to_string(), vec![], None, Instant::now(), &UnreachableClient, "hi")
            .await;
        assert!(!result.success);
        assert_eq!(result.error_code, Some(crate::error::ErrorCode::OutputTooShort));
    }
}
