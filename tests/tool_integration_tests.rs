//! Black-box coverage of tool dispatch through the coordinator: a full
//! request/response round trip and enforcement of the per-run tool-call cap.

use arc_reactor_core::chat_client::{BoxError, ChatClient, ChatResponse, PromptSpec};
use arc_reactor_core::context::RunContext;
use arc_reactor_core::metrics::NoopMetrics;
use arc_reactor_core::model::ToolCall;
use arc_reactor_core::tool::{FunctionTool, ToolCallback};
use arc_reactor_core::{AgentCommand, AgentConfig, AgentExecutionCoordinator, ExecutionMode};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

fn weather_tool() -> Arc<dyn ToolCallback> {
    Arc::new(FunctionTool::new(
        "weather",
        "returns current weather for a city",
        vec![],
        Arc::new(|args: Value| {
            Box::pin(async move {
                let city = args.get("city").and_then(Value::as_str).unwrap_or("unknown");
                Ok(json!(format!("25C sunny in {city}")))
            })
        }),
    ))
}

struct WeatherRoundTripClient {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatClient for WeatherRoundTripClient {
    async fn call(&self, prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
        let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_number == 0 {
            assert!(prompt.options.has_tools, "first round must offer the registered tools");
            Ok(ChatResponse {
                text: None,
                tool_calls: vec![ToolCall { id: "1".into(), name: "weather".into(), arguments: json!({"city": "Seoul"}) }],
                usage: None,
            })
        } else {
            Ok(ChatResponse { text: Some("Seoul is sunny, 25C.".into()), tool_calls: vec![], usage: None })
        }
    }

    fn model_name(&self) -> &str {
        "weather-roundtrip"
    }
}

#[tokio::test]
async fn s2_tool_roundtrip_returns_final_text_and_records_tool_used() {
    let client = Arc::new(WeatherRoundTripClient { calls: AtomicUsize::new(0) });
    let coordinator = AgentExecutionCoordinator::new(AgentConfig::default(), client, Arc::new(NoopMetrics))
        .unwrap()
        .with_local_tools(vec![weather_tool()]);
    let context = RunContext::new("u1", "What's the weather in Seoul?", HashMap::new());
    let command = AgentCommand::new("sys", "What's the weather in Seoul?").with_mode(ExecutionMode::React);

    let result = coordinator.execute(&context, command, Instant::now()).await;

    assert!(result.success);
    assert_eq!(result.content.as_deref(), Some("Seoul is sunny, 25C."));
    assert_eq!(result.tools_used, vec!["weather".to_string()]);
}

struct AlwaysCallClient {
    seq: AtomicUsize,
}

#[async_trait]
impl ChatClient for AlwaysCallClient {
    async fn call(&self, prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
        if prompt.options.has_tools {
            let id = self.seq.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                text: None,
                tool_calls: vec![ToolCall { id: id.to_string(), name: "t".into(), arguments: json!({}) }],
                usage: None,
            })
        } else {
            Ok(ChatResponse { text: Some("capped".into()), tool_calls: vec![], usage: None })
        }
    }

    fn model_name(&self) -> &str {
        "always-call"
    }
}

fn counting_tool(invocations: Arc<AtomicUsize>) -> Arc<dyn ToolCallback> {
    Arc::new(FunctionTool::new(
        "t",
        "increments a shared counter",
        vec![],
        Arc::new(move |_args: Value| {
            let invocations = invocations.clone();
            Box::pin(async move {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(json!("ok"))
            })
        }),
    ))
}

#[tokio::test]
async fn s3_tool_call_cap_is_enforced() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let mut config = AgentConfig::default();
    config.max_tool_calls = 2;
    let coordinator = AgentExecutionCoordinator::new(config, Arc::new(AlwaysCallClient { seq: AtomicUsize::new(0) }), Arc::new(NoopMetrics))
        .unwrap()
        .with_local_tools(vec![counting_tool(invocations.clone())]);
    let context = RunContext::new("u1", "go", HashMap::new());
    let command = AgentCommand::new("sys", "go").with_mode(ExecutionMode::React);

    let result = coordinator.execute(&context, command, Instant::now()).await;

    assert!(result.success);
    assert_eq!(result.content.as_deref(), Some("capped"), "the round after the cap is reached must carry no tools");
    assert_eq!(invocations.load(Ordering::SeqCst), 2, "the orchestrator must invoke the tool exactly maxToolCalls times");
}
