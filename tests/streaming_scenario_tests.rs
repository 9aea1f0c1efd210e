//! Black-box coverage of S6 (stream ordering): text chunks interleaved with
//! tool-start/tool-end markers, in order, with the last iteration's content
//! persisted to conversation memory.

use arc_reactor_core::chat_client::{BoxError, ChatClient, ChatResponse, ChatResponseStream, MessageChunk, PromptSpec};
use arc_reactor_core::context::RunContext;
use arc_reactor_core::memory::MemoryStore;
use arc_reactor_core::metrics::NoopMetrics;
use arc_reactor_core::model::{Message, ToolCall};
use arc_reactor_core::stream::{parse, StreamEventMarker};
use arc_reactor_core::streaming_react_loop::new_stream_channel;
use arc_reactor_core::tool::{FunctionTool, ToolCallback};
use arc_reactor_core::{AgentCommand, AgentConfig, AgentExecutionCoordinator, ExecutionMode};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

fn foo_tool() -> Arc<dyn ToolCallback> {
    Arc::new(FunctionTool::new(
        "foo",
        "a trivial tool",
        vec![],
        Arc::new(|_args: Value| Box::pin(async move { Ok(json!("done")) })),
    ))
}

struct TwoRoundStreamClient {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatClient for TwoRoundStreamClient {
    async fn call(&self, _prompt: PromptSpec) -> Result<ChatResponse, BoxError> {
        unreachable!("streaming mode must drive the stream() path, not call()")
    }

    async fn stream(&self, _prompt: PromptSpec) -> Result<ChatResponseStream, BoxError> {
        let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Result<MessageChunk, BoxError>> = if call_number == 0 {
            vec![
                Ok(MessageChunk { text: Some("Hel".into()), tool_calls: vec![], usage: None }),
                Ok(MessageChunk { text: Some("lo".into()), tool_calls: vec![], usage: None }),
                Ok(MessageChunk {
                    text: None,
                    tool_calls: vec![ToolCall { id: "1".into(), name: "foo".into(), arguments: json!({}) }],
                    usage: None,
                }),
            ]
        } else {
            vec![Ok(MessageChunk { text: Some("done".into()), tool_calls: vec![], usage: None })]
        };
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "two-round-stream"
    }
}

#[derive(Default)]
struct RecordingStore {
    saved: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl MemoryStore for RecordingStore {
    async fn load_history(&self, _session_id: &str) -> Result<Vec<Message>, BoxError> {
        Ok(Vec::new())
    }

    async fn save_turn(&self, session_id: &str, _user_message: &Message, assistant_message: &Message) -> Result<(), BoxError> {
        self.saved.lock().unwrap().push((session_id.to_string(), assistant_message.text.clone()));
        Ok(())
    }
}

#[tokio::test]
async fn s6_stream_ordering_and_persisted_last_iteration() {
    let store = Arc::new(RecordingStore::default());
    let coordinator = AgentExecutionCoordinator::new(
        AgentConfig::default(),
        Arc::new(TwoRoundStreamClient { calls: AtomicUsize::new(0) }),
        Arc::new(NoopMetrics),
    )
    .unwrap()
    .with_local_tools(vec![foo_tool()])
    .with_conversation_store(store.clone());

    let context = RunContext::new("u1", "hi", HashMap::new());
    let command = AgentCommand::new("sys", "hi").with_mode(ExecutionMode::Streaming);
    let (tx, mut rx) = new_stream_channel(32);

    coordinator.execute_stream(&context, command, Instant::now(), tx.clone()).await;
    drop(tx);

    let mut received = Vec::new();
    while let Some(chunk) = rx.next().await {
        received.push(chunk);
    }

    let decoded: Vec<String> = received
        .iter()
        .map(|chunk| match parse(chunk) {
            Some(StreamEventMarker::ToolStart { name }) => format!("tool_start({name})"),
            Some(StreamEventMarker::ToolEnd { name }) => format!("tool_end({name})"),
            Some(StreamEventMarker::Error { message }) => format!("error({message})"),
            None => chunk.clone(),
        })
        .collect();

    assert_eq!(decoded, vec!["Hel", "lo", "tool_start(foo)", "tool_end(foo)", "done"]);

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].1.as_deref(), Some("done"));
}
