//! Fallback strategy: an optional external collaborator consulted when the
//! primary execution path fails.

use crate::model::{AgentCommand, AgentResult};
use async_trait::async_trait;

#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    /// Returns `Some(result)` to adopt as the run's outcome, or `None` to
    /// leave the original failure in place.
    async fn recover(&self, command: &AgentCommand, failure: &crate::error::AgentError) -> Option<AgentResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFallback;
    #[async_trait]
    impl FallbackStrategy for StaticFallback {
        async fn recover(&self, _command: &AgentCommand, _failure: &crate::error::AgentError) -> Option<AgentResult> {
            Some(AgentResult::success("fallback response", vec![], 0))
        }
    }

    #[tokio::test]
    async fn fallback_can_adopt_a_result() {
        let fallback = StaticFallback;
        let command = AgentCommand::new("sys", "hi");
        let err = crate::error::AgentError::Timeout("slow".into());
        let result = fallback.recover(&command, &err).await.unwrap();
        assert!(result.success);
    }
}
