//! Best-effort token counting.
//!
//! The estimation formula (`len / 4`, floored at 1, plus a flat per-role
//! overhead) is lifted directly from
//! `cloudllm::llm_session::{count_tokens, count_message_tokens}`.

use crate::model::Message;

/// A pluggable token counter. The default implementation is the teacher's
/// character-based approximation; callers with access to a real tokenizer
/// can supply their own.
pub trait TokenEstimator: Send + Sync {
    fn estimate_text(&self, text: &str) -> usize;

    fn estimate_message(&self, message: &Message) -> usize {
        let mut total = message
            .text
            .as_deref()
            .map(|t| self.estimate_text(t))
            .unwrap_or(0);
        for call in &message.tool_calls {
            total += self.estimate_text(&format!("{}{}", call.name, call.arguments));
        }
        for response in &message.tool_responses {
            total += self.estimate_text(&response.output);
        }
        // Flat per-message role overhead, matching count_message_tokens.
        total + 1
    }
}

/// Character-count approximation: one token per four characters, floored at
/// one token for any non-empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApproximateTokenEstimator;

impl TokenEstimator for ApproximateTokenEstimator {
    fn estimate_text(&self, text: &str) -> usize {
        (text.len() / 4).max(1)
    }
}
