//! Runtime configuration for the agent execution core.
//!
//! Follows `cloudllm::config::CloudLLMConfig`'s stance: plain structs with
//! `Default` impls, no TOML/YAML/env parsing dependency introduced by this
//! crate. Callers build an [`AgentConfig`] however they like and pass it in,
//! typically deserialized from whatever config format their own binary uses.

use serde::{Deserialize, Serialize};

/// Top-level configuration tree, grouping the sub-configs named in the
/// external interface contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub max_tool_calls: u32,
    pub max_tools_per_request: usize,
    pub boundaries: BoundariesConfig,
    pub cache: CacheConfig,
    pub rag: RagConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            max_tool_calls: 10,
            max_tools_per_request: 20,
            boundaries: BoundariesConfig::default(),
            cache: CacheConfig::default(),
            rag: RagConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Validates the one cross-field invariant the spec names explicitly.
    pub fn validate(&self) -> Result<(), crate::error::AgentError> {
        if self.llm.max_context_window_tokens <= self.llm.max_output_tokens {
            return Err(crate::error::AgentError::Config(format!(
                "maxContextWindowTokens ({}) must be greater than maxOutputTokens ({})",
                self.llm.max_context_window_tokens, self.llm.max_output_tokens
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub default_provider: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: usize,
    pub max_context_window_tokens: usize,
    pub max_conversation_turns: usize,
    pub google_search_retrieval_enabled: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            temperature: 0.3,
            max_output_tokens: 4096,
            max_context_window_tokens: 128_000,
            max_conversation_turns: 10,
            google_search_retrieval_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_requests: usize,
    pub request_timeout_ms: u64,
    pub tool_call_timeout_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 20,
            request_timeout_ms: 30_000,
            tool_call_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

/// Policy applied when a final response is shorter than `output_min_chars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMinViolationMode {
    Warn,
    RetryOnce,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundariesConfig {
    pub input_min_chars: usize,
    pub input_max_chars: usize,
    pub output_min_chars: usize,
    pub output_max_chars: usize,
    pub output_min_violation_mode: OutputMinViolationMode,
}

impl Default for BoundariesConfig {
    fn default() -> Self {
        Self {
            input_min_chars: 0,
            input_max_chars: 0,
            output_min_chars: 0,
            output_max_chars: 0,
            output_min_violation_mode: OutputMinViolationMode::Warn,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub cacheable_temperature: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 300,
            cacheable_temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub rerank_enabled: bool,
    pub max_context_tokens: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top_k: 5,
            rerank_enabled: false,
            max_context_tokens: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_window() {
        let mut config = AgentConfig::default();
        config.llm.max_context_window_tokens = 100;
        config.llm.max_output_tokens = 200;
        assert!(config.validate().is_err());
    }
}
