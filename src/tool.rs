//! Tool capability surface: parameter/metadata shapes and the
//! `ToolCallback` trait.
//!
//! `ToolParameterType`/`ToolParameter` are carried over almost verbatim from
//! `cloudllm::tool_protocol` (including its builder methods); `ToolCallback`
//! replaces the teacher's protocol-routed `ToolProtocol`/`Tool` pair with a
//! single trait per callable, since this core's tool surface is a flat list
//! of callbacks (local closures, MCP-served, or otherwise) rather than a
//! multi-protocol registry.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    fn json_schema_name(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Number => "number",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
    pub items: Option<Box<ToolParameterType>>,
    pub properties: Option<HashMap<String, ToolParameter>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
            items: None,
            properties: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_items(mut self, item_type: ToolParameterType) -> Self {
        self.items = Some(Box::new(item_type));
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = serde_json::json!({ "type": self.param_type.json_schema_name() });
        if let Some(desc) = &self.description {
            schema["description"] = Value::String(desc.clone());
        }
        if let Some(items) = &self.items {
            schema["items"] = serde_json::json!({ "type": items.json_schema_name() });
        }
        if let Some(props) = &self.properties {
            let mut map = serde_json::Map::new();
            for (name, param) in props {
                map.insert(name.clone(), param.to_json_schema());
            }
            schema["properties"] = Value::Object(map);
        }
        schema
    }
}

/// Renders a flat parameter list into a JSON-Schema object string, the
/// `inputSchema` the external tool interface requires. Built by hand, the
/// way `cloudllm::tool_protocol::ToolMetadata` composes its own parameter
/// descriptions, rather than via a schema-derive crate.
pub fn build_input_schema(parameters: &[ToolParameter]) -> String {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for param in parameters {
        properties.insert(param.name.clone(), param.to_json_schema());
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }
    let schema = serde_json::json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    });
    schema.to_string()
}

pub type ToolError = Box<dyn Error + Send + Sync>;

/// A callable tool. Implementations wrap local functions, closures, or
/// remote-served capabilities (MCP and otherwise) behind this one interface
/// — the adapter pattern `cloudllm::tool_adapters::CustomToolAdapter` uses
/// for custom function callbacks, generalized to any origin.
#[async_trait]
pub trait ToolCallback: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &[ToolParameter];

    /// Per-tool timeout override; falls back to `toolCallTimeoutMs` when
    /// `None`.
    fn timeout_override(&self) -> Option<Duration> {
        None
    }

    /// Invokes the tool. Application-level failures should still return
    /// `Ok` with an explanatory string when the tool's own contract allows
    /// it; `Err` represents an execution failure surfaced to the LLM as
    /// `"Error: <message>"`.
    async fn call(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// A function-backed `ToolCallback`, the common case for locally registered
/// tools, mirroring `cloudllm::tool_adapters`'s `AsyncToolFunction` alias.
pub type AsyncToolFn = Arc<
    dyn Fn(Value) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value, ToolError>> + Send>>
        + Send
        + Sync,
>;

pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Vec<ToolParameter>,
    func: AsyncToolFn,
}

impl FunctionTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
        func: AsyncToolFn,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            func,
        }
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool").field("name", &self.name).finish()
    }
}

#[async_trait]
impl ToolCallback for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        (self.func)(arguments).await
    }
}

/// The shape exposed to the LLM for a prepared tool: `{name, description,
/// inputSchema}`, produced by wrapping any `ToolCallback`.
pub fn wrap_as_definition(callback: &Arc<dyn ToolCallback>) -> crate::chat_client::ToolDefinition {
    crate::chat_client::ToolDefinition {
        name: callback.name().to_string(),
        description: callback.description().to_string(),
        input_schema: build_input_schema(callback.parameters()),
    }
}
