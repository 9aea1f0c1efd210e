//! Pre-LLM guardrail pipeline. Fail-close: a rejection from any stage
//! terminates the execution with `GUARD_REJECTED`.
//!
//! Concrete guard implementations are external collaborators; this module
//! only declares the stage contract and the fixed-order pipeline runner,
//! matching the way `cloudllm::event::EventHandler` declares an interface
//! the host application implements.

use async_trait::async_trait;

/// Outcome of one guard stage.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardResult {
    Allowed,
    Rejected { reason: String, category: String, stage: String },
}

/// Input a guard stage evaluates against.
#[derive(Debug, Clone)]
pub struct GuardRequest {
    pub user_id: String,
    pub text: String,
    pub system_prompt: String,
}

/// One stage of the guard pipeline. Implementations are external; this
/// crate only runs the ordered pipeline of whatever stages are registered.
#[async_trait]
pub trait GuardStage: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, request: &GuardRequest) -> GuardResult;
}

/// Runs `stages` in registered order, stopping at the first rejection.
pub async fn run_guard_pipeline(stages: &[std::sync::Arc<dyn GuardStage>], request: &GuardRequest) -> GuardResult {
    for stage in stages {
        match stage.check(request).await {
            GuardResult::Allowed => continue,
            rejected @ GuardResult::Rejected { .. } => return rejected,
        }
    }
    GuardResult::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct AlwaysAllow;
    #[async_trait]
    impl GuardStage for AlwaysAllow {
        fn name(&self) -> &str {
            "always_allow"
        }
        async fn check(&self, _request: &GuardRequest) -> GuardResult {
            GuardResult::Allowed
        }
    }

    struct AlwaysReject;
    #[async_trait]
    impl GuardStage for AlwaysReject {
        fn name(&self) -> &str {
            "rate_limit"
        }
        async fn check(&self, _request: &GuardRequest) -> GuardResult {
            GuardResult::Rejected {
                reason: "Blocked".into(),
                category: "rate_limit".into(),
                stage: "rate_limit".into(),
            }
        }
    }

    #[tokio::test]
    async fn stops_at_first_rejection() {
        let stages: Vec<std::sync::Arc<dyn GuardStage>> = vec![Arc::new(AlwaysAllow), Arc::new(AlwaysReject)];
        let request = GuardRequest {
            user_id: "anonymous".into(),
            text: "hi".into(),
            system_prompt: "sys".into(),
        };
        let result = run_guard_pipeline(&stages, &request).await;
        assert_eq!(
            result,
            GuardResult::Rejected {
                reason: "Blocked".into(),
                category: "rate_limit".into(),
                stage: "rate_limit".into(),
            }
        );
    }
}
