//! Response caching: fingerprinting and the `ResponseCache` boundary.
//!
//! The in-memory default implementation follows the `Arc<RwLock<HashMap<..
//! >>>` shared-state idiom `cloudllm::tool_adapters::CustomToolAdapter` uses
//! for its registered-function maps.

use crate::model::{AgentCommand, ResponseFormat};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content: String,
    pub tools_used: Vec<String>,
}

/// The external cache collaborator. Concrete backends (Redis, Memcached,
/// ...) are out of scope; this crate ships only the in-memory default.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;
    async fn put(&self, key: String, entry: CacheEntry, ttl: Duration);
}

/// Deterministic fingerprint over the fields of `command` that matter for
/// cache identity plus the sorted tool-callback name set. Transient
/// metadata (anything not semantically part of the prompt) is excluded.
pub fn fingerprint(command: &AgentCommand, tool_names: &[String]) -> String {
    let mut sorted_tools = tool_names.to_vec();
    sorted_tools.sort();

    let format_tag = match command.response_format {
        ResponseFormat::Text => "text",
        ResponseFormat::Json => "json",
        ResponseFormat::Yaml => "yaml",
    };

    let mut hasher = Sha256::new();
    hasher.update(command.system_prompt.as_bytes());
    hasher.update(b"\0");
    hasher.update(command.user_prompt.as_bytes());
    hasher.update(b"\0");
    hasher.update(command.model.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(format_tag.as_bytes());
    hasher.update(b"\0");
    hasher.update(command.response_schema.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(sorted_tools.join(",").as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Whether caching should be consulted for this command, per the
/// `effectiveTemperature <= cacheableTemperature` rule.
pub fn is_cacheable(command: &AgentCommand, cacheable_temperature: f32) -> bool {
    command.temperature.unwrap_or(cacheable_temperature) <= cacheable_temperature
}

/// A process-local, TTL-expiring cache. Sufficient as the shipped default;
/// production deployments typically supply a distributed `ResponseCache`.
struct Slot {
    entry: CacheEntry,
    inserted_at: Instant,
    ttl: Duration,
}

pub struct InMemoryResponseCache {
    entries: Arc<RwLock<HashMap<String, Slot>>>,
}

impl Default for InMemoryResponseCache {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let slot = entries.get(key)?;
        if slot.inserted_at.elapsed() > slot.ttl {
            return None;
        }
        Some(slot.entry.clone())
    }

    async fn put(&self, key: String, entry: CacheEntry, ttl: Duration) {
        self.entries.write().expect("cache lock poisoned").insert(
            key,
            Slot { entry, inserted_at: Instant::now(), ttl },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_order_independent_over_tool_names() {
        let command = AgentCommand::new("sys", "hi");
        let a = fingerprint(&command, &["b".to_string(), "a".to_string()]);
        let b = fingerprint(&command, &["a".to_string(), "b".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_on_prompt_change() {
        let a = fingerprint(&AgentCommand::new("sys", "hi"), &[]);
        let b = fingerprint(&AgentCommand::new("sys", "bye"), &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn cacheable_respects_threshold() {
        let mut command = AgentCommand::new("sys", "hi");
        command.temperature = Some(0.0);
        assert!(is_cacheable(&command, 0.0));
        command.temperature = Some(0.5);
        assert!(!is_cacheable(&command, 0.0));
    }

    #[tokio::test]
    async fn in_memory_cache_roundtrips() {
        let cache = InMemoryResponseCache::default();
        cache
            .put(
                "key".to_string(),
                CacheEntry { content: "hi".into(), tools_used: vec![] },
                Duration::from_secs(60),
            )
            .await;
        let entry = cache.get("key").await.unwrap();
        assert_eq!(entry.content, "hi");
    }
}
