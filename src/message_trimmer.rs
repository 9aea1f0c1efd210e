//! Token-budget-aware context trimming with tool-call/tool-response pair
//! integrity.
//!
//! Generalizes `cloudllm::llm_session::LLMSession::trim_conversation_history`
//! (which only ever drops a single oldest message) into the two-phase,
//! pair-atomic algorithm the coordinator needs once tool turns are in the
//! mix: a tool_response message can never be separated from the
//! assistant-with-tool-calls message that produced it.

use crate::model::{Message, Role};
use crate::token_estimator::TokenEstimator;
use log::warn;

/// Computes `maxContextWindowTokens - tokens(systemPrompt) - maxOutputTokens`
/// and trims `messages` in place to fit it.
pub struct MessageTrimmer<'a> {
    estimator: &'a dyn TokenEstimator,
}

impl<'a> MessageTrimmer<'a> {
    pub fn new(estimator: &'a dyn TokenEstimator) -> Self {
        Self { estimator }
    }

    pub fn trim(
        &self,
        messages: &mut Vec<Message>,
        system_prompt: &str,
        max_context_window_tokens: usize,
        max_output_tokens: usize,
    ) {
        let system_tokens = self.estimator.estimate_text(system_prompt);
        let budget = (max_context_window_tokens as i64)
            - (system_tokens as i64)
            - (max_output_tokens as i64);

        if budget <= 0 {
            warn!(
                "message trimmer budget is non-positive ({budget}); reducing history to the last user message"
            );
            let last_user = messages
                .iter()
                .rposition(|m| m.role == Role::User)
                .map(|idx| messages[idx].clone());
            messages.clear();
            if let Some(msg) = last_user {
                messages.push(msg);
            }
            return;
        }
        let budget = budget as usize;

        self.trim_to_budget(messages, budget, 0);
        let last_user_idx = messages.iter().rposition(|m| m.role == Role::User);
        if let Some(idx) = last_user_idx {
            self.trim_to_budget(messages, budget, idx + 1);
        }
    }

    fn total_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.estimator.estimate_message(m)).sum()
    }

    /// Removes messages from the front of `messages`, starting no earlier
    /// than `floor_idx`, pair-atomically, until the list fits `budget` or
    /// only one message beyond `floor_idx` remains.
    fn trim_to_budget(&self, messages: &mut Vec<Message>, budget: usize, floor_idx: usize) {
        loop {
            if self.total_tokens(messages) <= budget {
                return;
            }
            if messages.len() <= floor_idx + 1 {
                return;
            }
            let removable = messages.len() - floor_idx;
            if removable <= 1 {
                return;
            }

            let front = &messages[floor_idx];
            if front.has_tool_calls() {
                // Remove the assistant-with-tool-calls message together
                // with its paired tool_response, if present immediately
                // after it.
                let pairs_with_next = messages
                    .get(floor_idx + 1)
                    .map(|next| next.is_paired_with(front))
                    .unwrap_or(false);
                messages.remove(floor_idx);
                if pairs_with_next {
                    messages.remove(floor_idx);
                }
            } else if front.role == Role::ToolResponse {
                // A stray tool_response at the front (its assistant
                // predecessor already trimmed in a prior pass) is removable
                // as a single unit.
                messages.remove(floor_idx);
            } else {
                messages.remove(floor_idx);
            }
        }
    }
}
