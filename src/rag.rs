//! Retrieval-augmented context injection. Fail-open: a retrieval failure
//! continues execution without context rather than failing the run.

use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RagQuery {
    pub query: String,
    pub top_k: usize,
    pub rerank: bool,
    pub filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct RagContext {
    pub text: String,
}

/// The external vector store / retriever collaborator.
#[async_trait]
pub trait RagPipeline: Send + Sync {
    async fn retrieve(&self, query: RagQuery) -> Result<RagContext, Box<dyn std::error::Error + Send + Sync>>;
}

/// Retrieves context for `user_prompt`, merging `command_metadata` into the
/// query filters. Returns `None` on any retrieval failure, having logged it.
pub async fn retrieve_context(
    pipeline: Option<&(dyn RagPipeline)>,
    user_prompt: &str,
    top_k: usize,
    rerank: bool,
    command_metadata: &HashMap<String, String>,
) -> Option<RagContext> {
    let pipeline = pipeline?;
    let filters = command_metadata
        .iter()
        .filter(|(k, _)| k.starts_with("rag.filter."))
        .map(|(k, v)| (k.trim_start_matches("rag.filter.").to_string(), v.clone()))
        .collect();
    let query = RagQuery {
        query: user_prompt.to_string(),
        top_k,
        rerank,
        filters,
    };
    match pipeline.retrieve(query).await {
        Ok(context) => Some(context),
        Err(err) => {
            log::warn!("RAG retrieval failed, continuing without context: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingPipeline;
    #[async_trait]
    impl RagPipeline for FailingPipeline {
        async fn retrieve(&self, _query: RagQuery) -> Result<RagContext, Box<dyn std::error::Error + Send + Sync>> {
            Err("vector store unreachable".into())
        }
    }

    #[tokio::test]
    async fn failure_degrades_to_none() {
        let result = retrieve_context(Some(&FailingPipeline), "hi", 5, false, &HashMap::new()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn no_pipeline_returns_none() {
        let result = retrieve_context(None, "hi", 5, false, &HashMap::new()).await;
        assert!(result.is_none());
    }
}
