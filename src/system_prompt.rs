//! Composes the effective system prompt sent to the LLM: the caller's base
//! prompt, an optional RAG context block, and a response-format directive.

use crate::model::ResponseFormat;
use crate::rag::RagContext;

/// Builds the final system prompt string for one LLM call.
pub struct SystemPromptBuilder<'a> {
    base_prompt: &'a str,
    rag_context: Option<&'a RagContext>,
    response_format: ResponseFormat,
    response_schema: Option<&'a str>,
}

impl<'a> SystemPromptBuilder<'a> {
    pub fn new(base_prompt: &'a str) -> Self {
        Self {
            base_prompt,
            rag_context: None,
            response_format: ResponseFormat::Text,
            response_schema: None,
        }
    }

    pub fn with_rag_context(mut self, context: Option<&'a RagContext>) -> Self {
        self.rag_context = context;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat, schema: Option<&'a str>) -> Self {
        self.response_format = format;
        self.response_schema = schema;
        self
    }

    pub fn build(&self) -> String {
        let mut sections = vec![self.base_prompt.to_string()];

        if let Some(context) = self.rag_context {
            if !context.text.trim().is_empty() {
                sections.push(format!(
                    "Relevant context retrieved for this request:\n{}",
                    context.text
                ));
            }
        }

        if let Some(directive) = self.format_directive() {
            sections.push(directive);
        }

        sections.join("\n\n")
    }

    fn format_directive(&self) -> Option<String> {
        match self.response_format {
            ResponseFormat::Text => None,
            ResponseFormat::Json => Some(match self.response_schema {
                Some(schema) => format!(
                    "Respond with only valid JSON matching this schema, no surrounding prose or code fences:\n{schema}"
                ),
                None => "Respond with only valid JSON, no surrounding prose or code fences.".to_string(),
            }),
            ResponseFormat::Yaml => Some(match self.response_schema {
                Some(schema) => format!(
                    "Respond with only valid YAML matching this schema, no surrounding prose or code fences:\n{schema}"
                ),
                None => "Respond with only valid YAML, no surrounding prose or code fences.".to_string(),
            }),
        }
    }
}
