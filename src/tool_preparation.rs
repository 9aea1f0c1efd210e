//! Resolves the ordered tool surface for one request: filters, dedup,
//! optional selection, and a per-request cap.

use crate::chat_client::ToolDefinition;
use crate::tool::{wrap_as_definition, ToolCallback};
use async_trait::async_trait;
use std::sync::Arc;

/// Narrows the locally-resolved tool list before dedup/selection. A filter
/// that errors keeps the previously-resolved list unchanged.
pub trait LocalToolFilter: Send + Sync {
    fn apply(
        &self,
        tools: Vec<Arc<dyn ToolCallback>>,
    ) -> Result<Vec<Arc<dyn ToolCallback>>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Picks a relevant subset of an already-deduplicated tool list given the
/// user prompt, e.g. an embedding-similarity ranker.
#[async_trait]
pub trait ToolSelector: Send + Sync {
    async fn select(&self, user_prompt: &str, callbacks: Vec<Arc<dyn ToolCallback>>) -> Vec<Arc<dyn ToolCallback>>;
}

pub struct ToolPreparationPlanner {
    local_filters: Vec<Arc<dyn LocalToolFilter>>,
    selector: Option<Arc<dyn ToolSelector>>,
    max_tools_per_request: usize,
}

impl ToolPreparationPlanner {
    pub fn new(max_tools_per_request: usize) -> Self {
        Self {
            local_filters: Vec::new(),
            selector: None,
            max_tools_per_request,
        }
    }

    pub fn with_local_filters(mut self, filters: Vec<Arc<dyn LocalToolFilter>>) -> Self {
        self.local_filters = filters;
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// `local_tools` go through the filter chain; `static_callbacks` and
    /// `dynamic_callbacks` (e.g. MCP-served) are merged in after, deduped by
    /// name across the whole set.
    pub async fn prepare(
        &self,
        user_prompt: &str,
        local_tools: Vec<Arc<dyn ToolCallback>>,
        static_callbacks: Vec<Arc<dyn ToolCallback>>,
        dynamic_callbacks: Vec<Arc<dyn ToolCallback>>,
    ) -> (Vec<Arc<dyn ToolCallback>>, Vec<ToolDefinition>) {
        let mut filtered_local = local_tools;
        for filter in &self.local_filters {
            match filter.apply(filtered_local.clone()) {
                Ok(next) => filtered_local = next,
                Err(err) => {
                    log::warn!("local tool filter failed, keeping previous tool list: {err}");
                }
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut deduped = Vec::new();
        for callback in static_callbacks.into_iter().chain(dynamic_callbacks) {
            if seen.insert(callback.name().to_string()) {
                deduped.push(callback);
            } else {
                log::info!("duplicate tool name '{}' dropped during preparation", callback.name());
            }
        }

        if let Some(selector) = &self.selector {
            if !deduped.is_empty() {
                deduped = selector.select(user_prompt, deduped).await;
            }
        }

        let mut combined = filtered_local;
        combined.extend(deduped);
        combined.truncate(self.max_tools_per_request);

        let definitions = combined.iter().map(wrap_as_definition).collect();
        (combined, definitions)
    }
}
