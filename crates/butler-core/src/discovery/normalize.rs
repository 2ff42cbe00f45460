//! Interpreting capability payloads

use serde_json::Value;

use crate::types::ToolDescriptor;

/// Parse `{tools: [...]}`; `None` if the payload has another shape
pub fn parse_tool_list(payload: &Value) -> Option<Vec<ToolDescriptor>> {
    let tools = payload.get("tools")?.as_array()?;
    Some(parse_descriptors(tools))
}

/// Parse either `{tools: [...]}` or a bare array of descriptors
///
/// Bare-array providers spell the schema `parameters`; the descriptor's
/// serde aliases take care of that, and missing descriptions or schemas
/// default to empty placeholders.
pub fn parse_tool_list_or_array(payload: &Value) -> Option<Vec<ToolDescriptor>> {
    match payload {
        Value::Array(items) => Some(parse_descriptors(items)),
        other => parse_tool_list(other),
    }
}

fn parse_descriptors(items: &[Value]) -> Vec<ToolDescriptor> {
    items
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

/// Split descriptors into named ones and a count of nameless ones
pub fn partition_named(tools: Vec<ToolDescriptor>) -> (Vec<ToolDescriptor>, usize) {
    let total = tools.len();
    let named: Vec<ToolDescriptor> = tools.into_iter().filter(ToolDescriptor::has_name).collect();
    let skipped = total - named.len();
    (named, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_list_shape() {
        let tools = parse_tool_list(&json!({
            "tools": [{"name": "ping", "description": "d", "inputSchema": {}}]
        }))
        .unwrap();
        assert_eq!(tools, vec![ToolDescriptor::new("ping", "d")]);
    }

    #[test]
    fn test_malformed_shapes() {
        assert!(parse_tool_list(&json!({"tools": "nope"})).is_none());
        assert!(parse_tool_list(&json!([])).is_none());
        assert!(parse_tool_list(&Value::Null).is_none());
    }

    #[test]
    fn test_bare_array_maps_parameters() {
        let tools = parse_tool_list_or_array(&json!([
            {"name": "search", "parameters": {"type": "object", "properties": {"q": {"type": "string"}}}},
            {"name": "noop"},
            "garbage"
        ]))
        .unwrap();

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].input_schema["properties"]["q"]["type"], "string");
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].input_schema, json!({}));
    }

    #[test]
    fn test_partition_named() {
        let (named, skipped) = partition_named(vec![
            ToolDescriptor::new("a", ""),
            ToolDescriptor::new("", "nameless"),
        ]);
        assert_eq!(named.len(), 1);
        assert_eq!(skipped, 1);
    }
}
