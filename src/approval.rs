//! Human-in-the-loop tool approval.
//!
//! Approval infrastructure failures are fail-open (treated as approved),
//! matching the fail-open posture every other pre-invocation hook in the
//! orchestrator takes except the guard/output-guard pipelines.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalDecision {
    Approved,
    Rejected { reason: String },
}

/// Decides whether a given tool call requires human sign-off before
/// invocation.
pub trait ToolApprovalPolicy: Send + Sync {
    fn requires_approval(&self, tool_name: &str, arguments: &Value) -> bool;
}

/// Submits a pending approval request and awaits the human decision. The
/// concrete store (a queue, a chat approval flow, ...) is external.
#[async_trait]
pub trait PendingApprovalStore: Send + Sync {
    async fn submit_and_await(
        &self,
        run_id: &str,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<ApprovalDecision, Box<dyn std::error::Error + Send + Sync>>;
}

/// Resolves the approval decision for one tool call given the configured
/// policy and store. `Ok(None)` means no approval was required.
pub async fn resolve_approval(
    policy: Option<&(dyn ToolApprovalPolicy)>,
    store: Option<&(dyn PendingApprovalStore)>,
    run_id: &str,
    tool_name: &str,
    arguments: &Value,
) -> Option<ApprovalDecision> {
    let policy = policy?;
    if !policy.requires_approval(tool_name, arguments) {
        return None;
    }
    let Some(store) = store else {
        return Some(ApprovalDecision::Approved);
    };
    match store.submit_and_await(run_id, tool_name, arguments).await {
        Ok(decision) => Some(decision),
        Err(err) => {
            log::warn!("approval infrastructure failed for '{tool_name}', treating as approved: {err}");
            Some(ApprovalDecision::Approved)
        }
    }
}
