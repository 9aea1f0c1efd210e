//! Conversation history persistence. An opaque external collaborator from
//! the coordinator's point of view — history load never fails the run, and
//! persistence is fail-open.

use crate::model::Message;
use async_trait::async_trait;

/// The external durable memory store. `cloudllm`'s own `ThoughtChain` is
/// this core's closest in-tree analogue, but it is a concrete
/// implementation detail (hash-chained JSONL persistence) the core must
/// not depend on directly — only this trait.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load_history(&self, session_id: &str) -> Result<Vec<Message>, Box<dyn std::error::Error + Send + Sync>>;
    async fn save_turn(&self, session_id: &str, user_message: &Message, assistant_message: &Message) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Thin façade the coordinator calls through; isolates the "opaque
/// external" framing from call sites and gives fail-open history loading a
/// single place to log from.
pub struct ConversationManager {
    store: Option<std::sync::Arc<dyn MemoryStore>>,
}

impl ConversationManager {
    pub fn new(store: Option<std::sync::Arc<dyn MemoryStore>>) -> Self {
        Self { store }
    }

    pub async fn load_history(&self, session_id: &str) -> Vec<Message> {
        let Some(store) = &self.store else {
            return Vec::new();
        };
        match store.load_history(session_id).await {
            Ok(history) => history,
            Err(err) => {
                log::warn!("conversation history load failed for '{session_id}', starting empty: {err}");
                Vec::new()
            }
        }
    }

    pub async fn save_turn(&self, session_id: &str, user_message: &Message, assistant_message: &Message) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save_turn(session_id, user_message, assistant_message).await {
            log::warn!("conversation history persist failed for '{session_id}': {err}");
        }
    }
}
