//! Error taxonomy for the agent execution core.
//!
//! Mirrors the way `cloudllm::tool_protocol::ToolError` is built: a plain
//! enum with hand-written `Display`/`Error` impls rather than a derive-macro
//! crate. Every wire-visible error code from the core's error handling
//! design has exactly one variant here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The wire-level error code surfaced on a failed `AgentResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GuardRejected,
    HookRejected,
    RateLimited,
    Timeout,
    ContextTooLong,
    ToolError,
    CircuitBreakerOpen,
    InvalidResponse,
    OutputGuardRejected,
    OutputTooShort,
    Unknown,
}

impl ErrorCode {
    /// The stable string form used in logs and `AgentResult.errorCode`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::GuardRejected => "GUARD_REJECTED",
            ErrorCode::HookRejected => "HOOK_REJECTED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ContextTooLong => "CONTEXT_TOO_LONG",
            ErrorCode::ToolError => "TOOL_ERROR",
            ErrorCode::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            ErrorCode::InvalidResponse => "INVALID_RESPONSE",
            ErrorCode::OutputGuardRejected => "OUTPUT_GUARD_REJECTED",
            ErrorCode::OutputTooShort => "OUTPUT_TOO_SHORT",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-level error type produced by the execution core.
#[derive(Debug, Clone)]
pub enum AgentError {
    GuardRejected { stage: String, reason: String },
    HookRejected { reason: String },
    BlockedIntent { name: String },
    RateLimited(String),
    Timeout(String),
    ContextTooLong(String),
    ToolError(String),
    CircuitBreakerOpen,
    InvalidResponse(String),
    OutputGuardRejected { stage: String, reason: String },
    OutputTooShort,
    Config(String),
    Cancelled,
    Unknown(String),
}

impl AgentError {
    /// Map to the wire-level error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            AgentError::GuardRejected { .. } => ErrorCode::GuardRejected,
            AgentError::HookRejected { .. } => ErrorCode::HookRejected,
            AgentError::BlockedIntent { .. } => ErrorCode::GuardRejected,
            AgentError::RateLimited(_) => ErrorCode::RateLimited,
            AgentError::Timeout(_) => ErrorCode::Timeout,
            AgentError::ContextTooLong(_) => ErrorCode::ContextTooLong,
            AgentError::ToolError(_) => ErrorCode::ToolError,
            AgentError::CircuitBreakerOpen => ErrorCode::CircuitBreakerOpen,
            AgentError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            AgentError::OutputGuardRejected { .. } => ErrorCode::OutputGuardRejected,
            AgentError::OutputTooShort => ErrorCode::OutputTooShort,
            AgentError::Config(_) => ErrorCode::Unknown,
            AgentError::Cancelled => ErrorCode::Unknown,
            AgentError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Whether this error, if it originated from a chat-client call, should
    /// be retried by the `RetryExecutor`. Only used internally; classifying
    /// raw LLM-client errors goes through `classify_transience` instead.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AgentError::RateLimited(_) | AgentError::Timeout(_) | AgentError::CircuitBreakerOpen
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            AgentError::GuardRejected { reason, .. } => reason.clone(),
            AgentError::HookRejected { reason } => reason.clone(),
            AgentError::BlockedIntent { name } => format!("Blocked intent: {}", name),
            AgentError::RateLimited(msg) => msg.clone(),
            AgentError::Timeout(msg) => msg.clone(),
            AgentError::ContextTooLong(msg) => msg.clone(),
            AgentError::ToolError(msg) => msg.clone(),
            AgentError::CircuitBreakerOpen => "Circuit breaker is open".to_string(),
            AgentError::InvalidResponse(msg) => msg.clone(),
            AgentError::OutputGuardRejected { reason, .. } => reason.clone(),
            AgentError::OutputTooShort => "Response was shorter than required".to_string(),
            AgentError::Config(msg) => msg.clone(),
            AgentError::Cancelled => "Execution was cancelled".to_string(),
            AgentError::Unknown(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.user_message())
    }
}

impl std::error::Error for AgentError {}

impl From<Box<dyn std::error::Error + Send + Sync>> for AgentError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        classify_error_message(&err.to_string())
    }
}

/// Classifies a lower-cased error message the way `ErrorClassifier` does in
/// the source system: substrings drive both the transience predicate and
/// the resulting `AgentError` variant.
pub fn classify_error_message(message: &str) -> AgentError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("too many requests") {
        return AgentError::RateLimited(message.to_string());
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return AgentError::Timeout(message.to_string());
    }
    if lower.contains("context length") {
        return AgentError::ContextTooLong(message.to_string());
    }
    if lower.contains("tool") {
        return AgentError::ToolError(message.to_string());
    }
    AgentError::Unknown(message.to_string())
}

/// Transience predicate used by the `RetryExecutor`. Mirrors the status-code
/// and keyword matching described in the error classifier design.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    const KEYWORDS: &[&str] = &[
        "rate limit",
        "too many requests",
        "timeout",
        "timed out",
        "connection refused",
        "connection reset",
        "internal server error",
        "service unavailable",
        "bad gateway",
    ];
    if KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    const STATUS_CODES: &[&str] = &["429", "500", "502", "503", "504"];
    const MARKERS: &[&str] = &["status", "http", "error", "code"];
    STATUS_CODES.iter().any(|code| {
        lower.contains(code) && MARKERS.iter().any(|marker| lower.contains(marker))
    })
}
