//! Black-box coverage of the simple-pass, structured-repair, output-boundary
//! and guard-rejection scenarios, driven entirely through the public
//! `AgentExecutionCoordinator` surface.

use arc_reactor_core::chat_client::{BoxError, ChatClient, ChatResponse, PromptSpec};
use arc_reactor_core::config::OutputMinViolationMode;
use arc_reactor_core::context::RunContext;
use arc_reactor_core::guard::{GuardRequest, GuardResult, GuardStage};
use arc_reactor_core::metrics::NoopMetrics;
use arc_reactor_core::model::ResponseFormat;
use arc_reactor_core::{AgentCommand, AgentConfig, AgentExecutionCoordinator, ErrorCode, ExecutionMode};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn run_context(prompt: &str) -> RunContext {
    RunContext::new("u1", prompt, HashMap::new())
}

struct ScriptedClient {
    replies: Vec<&'static str>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn single(reply: &'static str) -> Self {
        Self { replies: vec![reply], calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn call(&self, _prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.replies.get(i).or_else(|| self.replies.last()).copied().unwrap_or_default();
        Ok(ChatResponse { text: Some(text.to_string()), tool_calls: vec![], usage: None })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[tokio::test]
async fn s1_simple_pass() {
    let client = Arc::new(ScriptedClient::single("Hello!"));
    let coordinator = AgentExecutionCoordinator::new(AgentConfig::default(), client, Arc::new(NoopMetrics)).unwrap();
    let command = AgentCommand::new("You are helpful.", "Hi").with_mode(ExecutionMode::Standard);

    let result = coordinator.execute(&run_context("Hi"), command, Instant::now()).await;

    assert!(result.success);
    assert_eq!(result.content.as_deref(), Some("Hello!"));
    assert!(result.tools_used.is_empty());
    assert!(result.error_code.is_none());
}

#[tokio::test]
async fn s4_json_repair_recovers_invalid_output() {
    let client = Arc::new(ScriptedClient {
        replies: vec!["```json\n{\"a\":1,\n```", "{\"a\":1}"],
        calls: AtomicUsize::new(0),
    });
    let coordinator = AgentExecutionCoordinator::new(AgentConfig::default(), client, Arc::new(NoopMetrics)).unwrap();
    let command = AgentCommand::new("sys", "give me json")
        .with_mode(ExecutionMode::Standard)
        .with_response_format(ResponseFormat::Json);

    let result = coordinator.execute(&run_context("give me json"), command, Instant::now()).await;

    assert!(result.success);
    assert_eq!(result.content.as_deref(), Some("{\"a\":1}"));
}

#[tokio::test]
async fn s5_output_too_short_fails_closed() {
    let client = Arc::new(ScriptedClient::single("ok"));
    let mut config = AgentConfig::default();
    config.boundaries.output_min_chars = 100;
    config.boundaries.output_min_violation_mode = OutputMinViolationMode::Fail;
    let coordinator = AgentExecutionCoordinator::new(config, client, Arc::new(NoopMetrics)).unwrap();
    let command = AgentCommand::new("sys", "hi").with_mode(ExecutionMode::Standard);

    let result = coordinator.execute(&run_context("hi"), command, Instant::now()).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::OutputTooShort));
}

struct BlockRateLimit;

#[async_trait]
impl GuardStage for BlockRateLimit {
    fn name(&self) -> &str {
        "rate_limit"
    }
    async fn check(&self, request: &GuardRequest) -> GuardResult {
        if request.text.contains("too-fast") {
            GuardResult::Rejected { reason: "Blocked".into(), category: "rate_limit".into(), stage: "rateLimit".into() }
        } else {
            GuardResult::Allowed
        }
    }
}

struct UnreachableClient;

#[async_trait]
impl ChatClient for UnreachableClient {
    async fn call(&self, _prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
        panic!("guard rejection must short-circuit before any LLM call")
    }
    fn model_name(&self) -> &str {
        "unreachable"
    }
}

#[tokio::test]
async fn s8_guard_rejection_blocks_before_llm() {
    let coordinator = AgentExecutionCoordinator::new(AgentConfig::default(), Arc::new(UnreachableClient), Arc::new(NoopMetrics))
        .unwrap()
        .with_guard_stages(vec![Arc::new(BlockRateLimit)]);
    let command = AgentCommand::new("sys", "too-fast request");

    let result = coordinator.execute(&run_context("too-fast request"), command, Instant::now()).await;

    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::GuardRejected));
    assert_eq!(result.error_message.as_deref(), Some("Blocked"));
}
