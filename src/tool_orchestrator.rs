//! Parallel tool dispatch: cap enforcement, allow-listing, hooks, HITL
//! approval, per-tool timeouts, and metrics — all in index-preserving order.

use crate::approval::{resolve_approval, ApprovalDecision, PendingApprovalStore, ToolApprovalPolicy};
use crate::context::RunContext;
use crate::hook::{run_after_tool_call_hooks, run_before_tool_call_hooks, AfterToolCallHook, BeforeToolCallHook, HookResult};
use crate::metrics::AgentMetrics;
use crate::model::{ToolCall, ToolResponse};
use crate::tool::ToolCallback;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ToolCallOrchestrator {
    tools: HashMap<String, Arc<dyn ToolCallback>>,
    before_hooks: Vec<Arc<dyn BeforeToolCallHook>>,
    after_hooks: Vec<Arc<dyn AfterToolCallHook>>,
    approval_policy: Option<Arc<dyn ToolApprovalPolicy>>,
    approval_store: Option<Arc<dyn PendingApprovalStore>>,
    metrics: Arc<dyn AgentMetrics>,
    max_tool_calls: u32,
    default_tool_call_timeout: Duration,
    total_tool_calls: Arc<AtomicU32>,
}

impl ToolCallOrchestrator {
    pub fn new(
        tools: Vec<Arc<dyn ToolCallback>>,
        max_tool_calls: u32,
        default_tool_call_timeout: Duration,
        metrics: Arc<dyn AgentMetrics>,
        total_tool_calls: Arc<AtomicU32>,
    ) -> Self {
        Self {
            tools: tools.into_iter().map(|t| (t.name().to_string(), t)).collect(),
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
            approval_policy: None,
            approval_store: None,
            metrics,
            max_tool_calls,
            default_tool_call_timeout,
            total_tool_calls,
        }
    }

    pub fn with_before_hooks(mut self, hooks: Vec<Arc<dyn BeforeToolCallHook>>) -> Self {
        self.before_hooks = hooks;
        self
    }

    pub fn with_after_hooks(mut self, hooks: Vec<Arc<dyn AfterToolCallHook>>) -> Self {
        self.after_hooks = hooks;
        self
    }

    pub fn with_approval(mut self, policy: Option<Arc<dyn ToolApprovalPolicy>>, store: Option<Arc<dyn PendingApprovalStore>>) -> Self {
        self.approval_policy = policy;
        self.approval_store = store;
        self
    }

    /// Current value of the shared tool-call counter, read by the loop to
    /// decide when to stop offering tools.
    pub fn total_tool_calls(&self) -> u32 {
        self.total_tool_calls.load(Ordering::SeqCst)
    }

    /// Dispatches `calls` in parallel, returning responses in the same order
    /// (pairing by position, not by completion time).
    pub async fn dispatch(&self, context: &RunContext, calls: Vec<ToolCall>, allowed_tools: Option<&[String]>) -> Vec<ToolResponse> {
        let futures = calls.into_iter().map(|call| self.dispatch_one(context, call, allowed_tools));
        join_all(futures).await
    }

    async fn dispatch_one(&self, context: &RunContext, call: ToolCall, allowed_tools: Option<&[String]>) -> ToolResponse {
        let ToolCall { id, name, arguments } = call;
        let started = Instant::now();

        let observed = self.total_tool_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if observed > self.max_tool_calls {
            return ToolResponse {
                id,
                name,
                output: "Maximum tool call limit reached".to_string(),
            };
        }

        if let Some(allowed) = allowed_tools {
            if !allowed.iter().any(|t| t == &name) {
                self.metrics.record_tool_call(&name, 0, false);
                return ToolResponse {
                    id,
                    name: name.clone(),
                    output: format!("Tool '{name}' is not allowed for this request"),
                };
            }
        }

        if let HookResult::Reject { reason } = run_before_tool_call_hooks(&self.before_hooks, context, &name, &arguments).await {
            return ToolResponse {
                id,
                name,
                output: format!("Tool call rejected: {reason}"),
            };
        }

        match resolve_approval(
            self.approval_policy.as_deref(),
            self.approval_store.as_deref(),
            &context.run_id,
            &name,
            &arguments,
        )
        .await
        {
            Some(ApprovalDecision::Rejected { reason }) => {
                return ToolResponse {
                    id,
                    name,
                    output: format!("Tool call rejected by human: {reason}"),
                };
            }
            Some(ApprovalDecision::Approved) | None => {}
        }

        let Some(tool) = self.tools.get(&name) else {
            self.metrics.record_tool_call(&name, 0, false);
            return ToolResponse {
                id,
                name: name.clone(),
                output: format!("Tool '{name}' not found"),
            };
        };

        let timeout = tool.timeout_override().unwrap_or(self.default_tool_call_timeout);
        let arguments = if arguments.is_object() || arguments.is_null() {
            arguments
        } else {
            log::warn!("malformed arguments for tool '{name}', degrading to empty object");
            serde_json::json!({})
        };

        let (success, output) = match tokio::time::timeout(timeout, tool.call(arguments)).await {
            Ok(Ok(value)) => (true, value.to_string()),
            Ok(Err(err)) => (false, format!("Error: {err}")),
            Err(_) => (false, format!("Error: Tool '{name}' timed out after {}ms", timeout.as_millis())),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        run_after_tool_call_hooks(&self.after_hooks, context, &name, success, &output, duration_ms).await;
        self.metrics.record_tool_call(&name, duration_ms, success);
        if success {
            context.record_tool_used(name.clone());
        }

        ToolResponse { id, name, output }
    }
}
