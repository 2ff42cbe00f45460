//! Tool catalog presented to the chat model

use serde_json::{Map, Value};

use crate::types::{ModelTool, ToolDescriptor};

/// Coerce a provider schema into a JSON-Schema object
///
/// The model API rejects schemas without `type: object` and `properties`,
/// which many providers leave out for argument-less tools.
pub fn model_schema(schema: &Value) -> Value {
    let mut object = match schema {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    object
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    if !object.get("properties").map(Value::is_object).unwrap_or(false) {
        object.insert("properties".to_string(), Value::Object(Map::new()));
    }
    Value::Object(object)
}

/// `[server] description`
pub fn describe(server: &str, description: &str) -> String {
    format!("[{}] {}", server, description)
}

/// Catalog entry for a provider tool registered under `key`
pub fn provider_tool(key: &str, server: &str, tool: &ToolDescriptor) -> ModelTool {
    ModelTool {
        name: key.to_string(),
        description: describe(server, &tool.description),
        input_schema: model_schema(&tool.input_schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_schema_gets_shape() {
        assert_eq!(model_schema(&json!({})), json!({"type": "object", "properties": {}}));
        assert_eq!(model_schema(&Value::Null), json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_existing_schema_is_kept() {
        let schema = json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        });
        assert_eq!(model_schema(&schema), schema);
    }

    #[test]
    fn test_provider_tool() {
        let tool = ToolDescriptor::new("read_graph", "Read the entire knowledge graph");
        let entry = provider_tool("mem_read_graph", "mem", &tool);
        assert_eq!(entry.name, "mem_read_graph");
        assert_eq!(entry.description, "[mem] Read the entire knowledge graph");
        assert_eq!(entry.input_schema["type"], "object");
    }
}
