//! Post-LLM content validation. Fail-close, like [`crate::guard`], but
//! applied to the candidate output rather than the inbound prompt.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub enum OutputGuardResult {
    Allowed,
    Modified { content: String, reason: String, stage: String },
    Rejected { reason: String, stage: String },
}

#[async_trait]
pub trait OutputGuardStage: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, content: &str) -> OutputGuardResult;
}

/// Runs the output guard pipeline in order. On pipeline exception (a stage
/// implementation panicking is not caught here; a stage returning an error
/// path should do so via `Rejected`), the caller treats the content as
/// rejected — see `ExecutionResultFinalizer`.
pub async fn run_output_guard_pipeline(stages: &[std::sync::Arc<dyn OutputGuardStage>], content: &str) -> OutputGuardResult {
    let mut current = content.to_string();
    for stage in stages {
        match stage.check(&current).await {
            OutputGuardResult::Allowed => continue,
            OutputGuardResult::Modified { content, .. } => {
                current = content;
            }
            rejected @ OutputGuardResult::Rejected { .. } => return rejected,
        }
    }
    if current != content {
        OutputGuardResult::Modified {
            content: current,
            reason: "modified by output guard pipeline".to_string(),
            stage: "pipeline".to_string(),
        }
    } else {
        OutputGuardResult::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Redactor;
    #[async_trait]
    impl OutputGuardStage for Redactor {
        fn name(&self) -> &str {
            "redactor"
        }
        async fn check(&self, content: &str) -> OutputGuardResult {
            if content.contains("secret") {
                OutputGuardResult::Modified {
                    content: content.replace("secret", "[redacted]"),
                    reason: "redacted sensitive term".into(),
                    stage: "redactor".into(),
                }
            } else {
                OutputGuardResult::Allowed
            }
        }
    }

    #[tokio::test]
    async fn modifies_when_a_stage_modifies() {
        let stages: Vec<Arc<dyn OutputGuardStage>> = vec![Arc::new(Redactor)];
        let result = run_output_guard_pipeline(&stages, "the secret is out").await;
        match result {
            OutputGuardResult::Modified { content, .. } => assert_eq!(content, "the [redacted] is out"),
            other => panic!("expected Modified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn allowed_when_untouched() {
        let stages: Vec<Arc<dyn OutputGuardStage>> = vec![Arc::new(Redactor)];
        let result = run_output_guard_pipeline(&stages, "nothing to see").await;
        assert_eq!(result, OutputGuardResult::Allowed);
    }
}
