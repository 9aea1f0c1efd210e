//! Validates and, on failure, repairs structured LLM output.
//!
//! TEXT passes through untouched. JSON/YAML are fence-stripped and parsed;
//! an invalid result earns exactly one repair call back to the LLM before
//! giving up with `INVALID_RESPONSE`.

use crate::chat_client::{ChatClient, ChatOptions, PromptSpec};
use crate::error::AgentError;
use crate::model::{Message, ResponseFormat};

/// Strips a single leading/trailing triple-backtick fence, tolerating an
/// optional language tag on the opening fence (` ```json `, ` ```yaml `).
fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = body.strip_suffix("```") else {
        return trimmed;
    };
    let body = body.trim_start_matches(|c: char| c.is_alphanumeric());
    body.trim()
}

fn is_valid(format: ResponseFormat, content: &str) -> bool {
    match format {
        ResponseFormat::Text => true,
        ResponseFormat::Json => serde_json::from_str::<serde_json::Value>(content).is_ok(),
        ResponseFormat::Yaml => serde_yaml::from_str::<serde_yaml::Value>(content).is_ok(),
    }
}

fn format_name(format: ResponseFormat) -> &'static str {
    match format {
        ResponseFormat::Text => "TEXT",
        ResponseFormat::Json => "JSON",
        ResponseFormat::Yaml => "YAML",
    }
}

/// Validates `content` against `format`, issuing at most one repair call
/// through `chat_client` if the first pass is invalid.
pub async fn validate_or_repair(
    chat_client: &dyn ChatClient,
    format: ResponseFormat,
    content: &str,
) -> Result<String, AgentError> {
    if format == ResponseFormat::Text {
        return Ok(content.to_string());
    }

    let stripped = strip_fence(content);
    if is_valid(format, stripped) {
        return Ok(stripped.to_string());
    }

    let name = format_name(format);
    let repair_prompt = PromptSpec {
        system_prompt: Some(format!(
            "Fix this {name}; return only valid {name} with no surrounding prose or code fences."
        )),
        messages: vec![Message::user(content.to_string())],
        options: ChatOptions::default(),
        tools: Vec::new(),
    };

    let repaired = chat_client
        .call(repair_prompt)
        .await
        .map_err(|err| AgentError::InvalidResponse(err.to_string()))?;

    let repaired_text = repaired.text.unwrap_or_default();
    let repaired_stripped = strip_fence(&repaired_text);
    if is_valid(format, repaired_stripped) {
        Ok(repaired_stripped.to_string())
    } else {
        Err(AgentError::InvalidResponse(format!(
            "response was not valid {name} after repair"
        )))
    }
}
