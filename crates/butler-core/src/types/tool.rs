//! Tool descriptor and result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One capability exposed by a provider
///
/// `name` is unique within its provider only. Providers disagree on how the
/// schema field is spelled, so `inputSchema`, `input_schema` and
/// `parameters` are all accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Local tool name
    #[serde(default)]
    pub name: String,
    /// Human description
    #[serde(default)]
    pub description: String,
    /// Input-shape schema
    #[serde(
        rename = "inputSchema",
        alias = "input_schema",
        alias = "parameters",
        default = "empty_schema"
    )]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    Value::Object(Default::default())
}

impl ToolDescriptor {
    /// Create a descriptor with an empty schema
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: empty_schema(),
        }
    }

    /// Set the input schema
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Whether the descriptor carries a usable name
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A tool as presented to the chat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTool {
    /// Namespaced identifier (or bare name for special tools)
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// JSON-Schema object with `type` and `properties`
    pub input_schema: Value,
}

/// Uniform result of a successful tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
