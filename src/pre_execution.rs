//! Guard + before-hook checks and intent resolution, run before any LLM
//! call is made. The first rejection from either stage short-circuits the
//! whole execution.

use crate::context::HookContext;
use crate::error::AgentError;
use crate::guard::{run_guard_pipeline, GuardRequest, GuardResult, GuardStage};
use crate::hook::{run_before_start_hooks, BeforeAgentStartHook, HookResult};
use crate::intent::{resolve_intent, IntentResolver};
use crate::metrics::AgentMetrics;
use crate::model::AgentCommand;
use std::sync::Arc;

pub struct PreExecutionResolver {
    guard_stages: Vec<Arc<dyn GuardStage>>,
    before_start_hooks: Vec<Arc<dyn BeforeAgentStartHook>>,
    intent_resolver: Option<Arc<dyn IntentResolver>>,
    metrics: Arc<dyn AgentMetrics>,
}

impl PreExecutionResolver {
    pub fn new(
        guard_stages: Vec<Arc<dyn GuardStage>>,
        before_start_hooks: Vec<Arc<dyn BeforeAgentStartHook>>,
        intent_resolver: Option<Arc<dyn IntentResolver>>,
        metrics: Arc<dyn AgentMetrics>,
    ) -> Self {
        Self {
            guard_stages,
            before_start_hooks,
            intent_resolver,
            metrics,
        }
    }

    pub async fn check_guard(&self, command: &AgentCommand) -> Result<(), AgentError> {
        let request = GuardRequest {
            user_id: command.user_id.clone().unwrap_or_else(|| "anonymous".to_string()),
            text: command.user_prompt.clone(),
            system_prompt: command.system_prompt.clone(),
        };
        match run_guard_pipeline(&self.guard_stages, &request).await {
            GuardResult::Allowed => Ok(()),
            GuardResult::Rejected { reason, category, stage } => {
                self.metrics.record_guard_rejection(&stage, &reason);
                let _ = category;
                Err(AgentError::GuardRejected { stage, reason })
            }
        }
    }

    pub async fn check_before_hooks(&self, context: &HookContext) -> Result<(), AgentError> {
        match run_before_start_hooks(&self.before_start_hooks, context).await {
            HookResult::Continue => Ok(()),
            HookResult::Reject { reason } => Err(AgentError::HookRejected { reason }),
        }
    }

    /// Resolves the effective command. Propagates `BlockedIntent` as a hard
    /// failure; everything else from intent resolution degrades silently
    /// (see [`crate::intent::resolve_intent`]).
    pub async fn resolve_intent(&self, command: &AgentCommand) -> Result<AgentCommand, AgentError> {
        resolve_intent(self.intent_resolver.as_deref(), command).await
    }
}
