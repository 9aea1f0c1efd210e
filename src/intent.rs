//! Intent classification and profile application.
//!
//! An optional stage: when no `IntentResolver` is configured, the effective
//! command is just the original command. When configured, a classified
//! intent either blocks the request outright or applies a profile that may
//! rewrite the system prompt and narrow the tool surface via
//! `intentAllowedTools` metadata — the mechanism
//! `ToolCallOrchestrator`'s allow-list step reads.

use crate::model::AgentCommand;
use async_trait::async_trait;

/// A resolved intent profile: optional overrides applied to the effective
/// command.
#[derive(Debug, Clone, Default)]
pub struct IntentProfile {
    pub system_prompt_override: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
}

#[async_trait]
pub trait IntentResolver: Send + Sync {
    /// Classifies the command's intent name.
    async fn classify(&self, command: &AgentCommand) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    /// The set of intent names that block execution outright.
    fn blocked_intents(&self) -> &[String];

    /// Resolves the profile to apply for a (non-blocked) intent name.
    async fn resolve_profile(&self, intent: &str) -> Result<IntentProfile, Box<dyn std::error::Error + Send + Sync>>;
}

fn apply_profile(command: &AgentCommand, profile: IntentProfile) -> AgentCommand {
    let mut effective = command.clone();
    if let Some(prompt) = profile.system_prompt_override {
        effective.system_prompt = prompt;
    }
    if let Some(tools) = profile.allowed_tools {
        effective.metadata.insert("intentAllowedTools".to_string(), tools.join(","));
    }
    effective
}

/// Resolves the effective command for `command` given an optional resolver.
/// Returns `Err(BlockedIntent)` only when the classified intent is in the
/// resolver's blocked set; any other resolver failure is fail-safe (logged,
/// original command returned unchanged).
pub async fn resolve_intent(
    resolver: Option<&(dyn IntentResolver)>,
    command: &AgentCommand,
) -> Result<AgentCommand, crate::error::AgentError> {
    let Some(resolver) = resolver else {
        return Ok(command.clone());
    };

    let intent = match resolver.classify(command).await {
        Ok(intent) => intent,
        Err(err) => {
            log::warn!("intent classification failed, falling back to original command: {err}");
            return Ok(command.clone());
        }
    };

    if resolver.blocked_intents().iter().any(|b| b == &intent) {
        return Err(crate::error::AgentError::BlockedIntent { name: intent });
    }

    match resolver.resolve_profile(&intent).await {
        Ok(profile) => Ok(apply_profile(command, profile)),
        Err(err) => {
            log::warn!("intent profile resolution failed for '{intent}', falling back: {err}");
            Ok(command.clone())
        }
    }
}
