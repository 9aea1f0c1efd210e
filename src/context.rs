//! Run-scoped state: `RunContext`/`HookContext` and the MDC-like logging
//! tag scope.
//!
//! Grounded in `cloudllm::agent::Agent`'s `id`/`metadata: HashMap<String,
//! String>` fields generalized into a dedicated per-execution context, and
//! in the teacher's `Arc<RwLock<_>>` shared-state idiom used throughout
//! (`ToolRegistry`, `ThoughtChain` handles) for the concurrency-safe
//! `toolsUsed` collector.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Per-execution context, created once by `AgentExecutor` and observed by
/// guards, hooks and the orchestrator for the lifetime of one run.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    pub user_id: String,
    pub user_prompt: String,
    pub channel: Option<String>,
    tools_used: Arc<Mutex<Vec<String>>>,
    metadata: Arc<RwLock<HashMap<String, String>>>,
}

impl RunContext {
    pub fn new(user_id: impl Into<String>, user_prompt: impl Into<String>, metadata: HashMap<String, String>) -> Self {
        let channel = metadata.get("channel").cloned();
        Self {
            run_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            user_prompt: user_prompt.into(),
            channel,
            tools_used: Arc::new(Mutex::new(Vec::new())),
            metadata: Arc::new(RwLock::new(metadata)),
        }
    }

    /// Records a tool name used by the orchestrator. Safe to call from
    /// concurrently dispatched tool-call tasks.
    pub fn record_tool_used(&self, name: impl Into<String>) {
        self.tools_used.lock().expect("tools_used lock poisoned").push(name.into());
    }

    pub fn tools_used(&self) -> Vec<String> {
        self.tools_used.lock().expect("tools_used lock poisoned").clone()
    }

    pub fn metadata_get(&self, key: &str) -> Option<String> {
        self.metadata.read().expect("metadata lock poisoned").get(key).cloned()
    }

    /// Mutates the shared metadata map. Per the concurrency model, this must
    /// only be called from single-writer phases (intent resolution,
    /// finalize) — the orchestrator and hooks only observe it.
    pub fn metadata_set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata
            .write()
            .expect("metadata lock poisoned")
            .insert(key.into(), value.into());
    }

    pub fn metadata_snapshot(&self) -> HashMap<String, String> {
        self.metadata.read().expect("metadata lock poisoned").clone()
    }
}

/// Context handed to guard/hook implementations. Distinct type from
/// `RunContext` in the interface (per the data model table) even though it
/// wraps the same underlying state in this implementation.
pub type HookContext = RunContext;

tokio::task_local! {
    static MDC_RUN_ID: String;
}

/// Runs `fut` with the MDC-like logging tag scoped to `run_id`, mirroring a
/// synchronous MDC push-on-entry/clear-in-finally pattern with
/// `tokio::task_local!` instead of a thread-local, since suspension points
/// may resume on a different worker thread.
pub async fn with_run_scope<F, T>(run_id: String, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    MDC_RUN_ID.scope(run_id, fut).await
}

/// Reads the current run id tag, if inside a `with_run_scope` call.
pub fn current_run_id() -> Option<String> {
    MDC_RUN_ID.try_with(|id| id.clone()).ok()
}
