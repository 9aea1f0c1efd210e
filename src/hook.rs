//! Lifecycle hook system. Fail-open except at the moment a hook explicitly
//! rejects before start; otherwise exceptions are logged and discarded, and
//! the default action taken.
//!
//! The four lifecycle points mirror the event categories
//! `cloudllm::event::AgentEvent` already distinguishes
//! (`SendStarted`/`SendCompleted`/...), generalized into dedicated hook
//! traits so each can run in ascending declared order and short-circuit
//! independently, rather than a single fan-out event bus.

use crate::context::HookContext;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum HookResult {
    Continue,
    Reject { reason: String },
}

/// Runs before guard checks resolve to a go/no-go.
#[async_trait]
pub trait BeforeAgentStartHook: Send + Sync {
    async fn on_before_start(&self, context: &HookContext) -> HookResult;
}

/// Runs before a tool is invoked; a `Reject` here skips invocation.
#[async_trait]
pub trait BeforeToolCallHook: Send + Sync {
    async fn on_before_tool_call(&self, context: &HookContext, tool_name: &str, arguments: &serde_json::Value) -> HookResult;
}

/// Always invoked after a tool call attempt, success or failure. Fail-open:
/// the orchestrator never fails the call because this hook errored.
#[async_trait]
pub trait AfterToolCallHook: Send + Sync {
    async fn on_after_tool_call(&self, context: &HookContext, tool_name: &str, success: bool, output: &str, duration_ms: u64);
}

/// Runs once execution has produced a final result (or failed/cancelled).
#[async_trait]
pub trait AfterAgentCompleteHook: Send + Sync {
    async fn on_after_complete(&self, context: &HookContext, success: bool, content: Option<&str>);
}

/// Runs the before-start hooks in ascending declared order, returning the
/// first rejection.
pub async fn run_before_start_hooks(hooks: &[Arc<dyn BeforeAgentStartHook>], context: &HookContext) -> HookResult {
    for hook in hooks {
        match hook.on_before_start(context).await {
            HookResult::Continue => continue,
            rejected @ HookResult::Reject { .. } => return rejected,
        }
    }
    HookResult::Continue
}

pub async fn run_before_tool_call_hooks(
    hooks: &[Arc<dyn BeforeToolCallHook>],
    context: &HookContext,
    tool_name: &str,
    arguments: &serde_json::Value,
) -> HookResult {
    for hook in hooks {
        match hook.on_before_tool_call(context, tool_name, arguments).await {
            HookResult::Continue => continue,
            rejected @ HookResult::Reject { .. } => return rejected,
        }
    }
    HookResult::Continue
}

/// Fail-open fan-out: every hook runs regardless of others' outcomes, and a
/// panic-free implementation error is merely logged.
pub async fn run_after_tool_call_hooks(
    hooks: &[Arc<dyn AfterToolCallHook>],
    context: &HookContext,
    tool_name: &str,
    success: bool,
    output: &str,
    duration_ms: u64,
) {
    for hook in hooks {
        hook.on_after_tool_call(context, tool_name, success, output, duration_ms).await;
    }
}

pub async fn run_after_complete_hooks(
    hooks: &[Arc<dyn AfterAgentCompleteHook>],
    context: &HookContext,
    success: bool,
    content: Option<&str>,
) {
    for hook in hooks {
        hook.on_after_complete(context, success, content).await;
    }
}

/// Helper for fail-open regions that wrap a fallible external call: logs
/// and discards any error, returning `default` instead.
pub fn fail_open<T>(label: &str, result: Result<T, Box<dyn std::error::Error + Send + Sync>>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("{label} failed, continuing with default: {err}");
            default
        }
    }
}
