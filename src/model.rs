//! Core data model: commands, results, messages and tool calls.
//!
//! `Message`/`Role`/`TokenUsage` are generalized from
//! `cloudllm::client_wrapper`'s shapes; `ToolCall`/`ToolResponse` replace the
//! string-embedded `{"tool_call": {...}}` convention `cloudllm::agent` parses
//! out of free text with native, structurally-typed fields, matching the
//! `NativeToolCall` shape the teacher already carries alongside its
//! text-parsed path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Execution mode requested for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Standard,
    React,
    Streaming,
}

/// Desired shape of the final textual content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Text,
    Json,
    Yaml,
}

/// An inline media attachment (image, audio, ...). Payload shape is left to
/// the caller/ChatClient; the core only threads it through unopened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

/// A single request into the agent execution core. Immutable once created;
/// intent resolution produces a *new* `AgentCommand` rather than mutating
/// this one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommand {
    pub user_prompt: String,
    pub system_prompt: String,
    pub user_id: Option<String>,
    pub model: Option<String>,
    pub mode: ExecutionMode,
    pub response_format: ResponseFormat,
    pub response_schema: Option<String>,
    pub temperature: Option<f32>,
    pub max_tool_calls: Option<u32>,
    pub media: Vec<Media>,
    pub metadata: HashMap<String, String>,
}

impl AgentCommand {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            system_prompt: system_prompt.into(),
            user_id: None,
            model: None,
            mode: ExecutionMode::React,
            response_format: ResponseFormat::Text,
            response_schema: None,
            temperature: None,
            max_tool_calls: None,
            media: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Names the tools the caller/command is restricted to, if an intent
    /// profile or the caller set `intentAllowedTools` in metadata.
    pub fn allowed_tools(&self) -> Option<Vec<String>> {
        self.metadata
            .get("intentAllowedTools")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
    }
}

/// Accumulated token usage across one or more LLM calls in a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Final, immutable outcome of one `execute()` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub content: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<crate::error::ErrorCode>,
    pub tools_used: Vec<String>,
    pub token_usage: Option<TokenUsage>,
    pub duration_ms: u64,
    /// Wall-clock time the result was produced, for metrics records and
    /// history entries that need to be ordered/expired against real time
    /// rather than this process's monotonic clock.
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

impl AgentResult {
    pub fn success(content: impl Into<String>, tools_used: Vec<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            error_message: None,
            error_code: None,
            tools_used,
            token_usage: None,
            duration_ms,
            completed_at: chrono::Utc::now(),
        }
    }

    pub fn failure(error: &crate::error::AgentError, duration_ms: u64) -> Self {
        Self {
            success: false,
            content: None,
            error_message: Some(error.user_message()),
            error_code: Some(error.code()),
            tools_used: Vec::new(),
            token_usage: None,
            duration_ms,
            completed_at: chrono::Utc::now(),
        }
    }

    pub fn with_tools_used(mut self, tools_used: Vec<String>) -> Self {
        self.tools_used = tools_used;
        self
    }

    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }
}

/// A tool invocation request emitted by the LLM. `id` is unique within one
/// assistant message and pairs it with its eventual `ToolResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The paired return value for a `ToolCall`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub output: String,
}

/// Conversation participant role, matching `cloudllm::client_wrapper::Role`
/// generalized with a `ToolResponse` variant for paired tool output instead
/// of overloading `Tool { call_id }` on a text-only message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResponse,
}

/// One turn of the conversation. `tool_calls` is populated only on
/// `Role::Assistant` messages that requested tool invocations;
/// `tool_responses` is populated only on `Role::ToolResponse` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_responses: Vec<ToolResponse>,
    pub media: Vec<MediaRef>,
}

/// Lightweight handle to media already attached to a message; kept separate
/// from `Media` (the inbound attachment with bytes) so history replay does
/// not have to retain payloads indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub mime_type: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: Some(text.into()),
            tool_calls: Vec::new(),
            tool_responses: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn assistant_with_tool_calls(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            text,
            tool_calls,
            tool_responses: Vec::new(),
            media: Vec::new(),
        }
    }

    pub fn tool_responses(responses: Vec<ToolResponse>) -> Self {
        Self {
            role: Role::ToolResponse,
            text: None,
            tool_calls: Vec::new(),
            tool_responses: responses,
            media: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        matches!(self.role, Role::Assistant) && !self.tool_calls.is_empty()
    }

    /// Whether this tool-response message's ids are all claimed by `prev`'s
    /// tool calls — the pairing invariant the trimmer and the loop must
    /// preserve.
    pub fn is_paired_with(&self, prev: &Message) -> bool {
        if self.role != Role::ToolResponse || !prev.has_tool_calls() {
            return false;
        }
        self.tool_responses
            .iter()
            .all(|r| prev.tool_calls.iter().any(|c| c.id == r.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_invariant_holds_for_matching_ids() {
        let assistant = Message::assistant_with_tool_calls(
            None,
            vec![ToolCall {
                id: "1".into(),
                name: "weather".into(),
                arguments: Value::Null,
            }],
        );
        let response = Message::tool_responses(vec![ToolResponse {
            id: "1".into(),
            name: "weather".into(),
            output: "sunny".into(),
        }]);
        assert!(response.is_paired_with(&assistant));
    }

    #[test]
    fn pairing_invariant_rejects_mismatched_ids() {
        let assistant = Message::assistant_with_tool_calls(
            None,
            vec![ToolCall {
                id: "1".into(),
                name: "weather".into(),
                arguments: Value::Null,
            }],
        );
        let response = Message::tool_responses(vec![ToolResponse {
            id: "2".into(),
            name: "weather".into(),
            output: "sunny".into(),
        }]);
        assert!(!response.is_paired_with(&assistant));
    }

    #[test]
    fn allowed_tools_parses_csv_metadata() {
        let cmd = AgentCommand::new("sys", "hi")
            .with_metadata("intentAllowedTools", "weather, search");
        assert_eq!(
            cmd.allowed_tools(),
            Some(vec!["weather".to_string(), "search".to_string()])
        );
    }
}
