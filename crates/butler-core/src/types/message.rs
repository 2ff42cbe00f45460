//! Chat transcript types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A chat message exchanged with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender
    pub role: MessageRole,
    /// The content of the message (string or structured parts)
    pub content: MessageContent,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Create a message with structured content parts
    pub fn with_parts(role: MessageRole, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
        }
    }

    /// Get the text content if this is a simple text message
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(s) => Some(s),
            MessageContent::Parts(_) => None,
        }
    }

    /// Concatenated text of the message, whatever its shape
    pub fn joined_text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Message content - either simple text or structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Structured content with multiple parts
    Parts(Vec<ContentPart>),
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

/// Structured content item inside a message
///
/// Deserialization is lenient for tool-use items (see `RawContentPart`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },
    /// Tool use (assistant calling a tool)
    ToolUse {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        input: Value,
    },
    /// Tool result (returning tool output)
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
    /// Any item type this crate does not model (thinking blocks, images, ...)
    Unknown,
}

/// Wire shape accepted for a content item
///
/// Models and proxies have been seen emitting `tool_name` instead of (or
/// next to) `name`, `tool_input` or `arguments` instead of `input`, and ids
/// or names of the wrong JSON type. Every tool-use field is read as a raw
/// value so none of that fails the whole response; a name that is not a
/// non-empty string becomes `None` and the orchestration loop turns the item
/// into text.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawContentPart {
    Text {
        #[serde(default)]
        text: Value,
    },
    ToolUse {
        #[serde(default)]
        id: Value,
        #[serde(default)]
        name: Value,
        #[serde(default)]
        tool_name: Value,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        tool_input: Value,
        #[serde(default)]
        arguments: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

fn non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

impl From<RawContentPart> for ContentPart {
    fn from(raw: RawContentPart) -> Self {
        match raw {
            RawContentPart::Text { text } => ContentPart::Text {
                text: match text {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                },
            },
            RawContentPart::ToolUse {
                id,
                name,
                tool_name,
                input,
                tool_input,
                arguments,
            } => ContentPart::ToolUse {
                id: non_empty_string(id).unwrap_or_default(),
                name: non_empty_string(tool_name).or_else(|| non_empty_string(name)),
                input: [input, tool_input, arguments]
                    .into_iter()
                    .find(|v| !v.is_null())
                    .unwrap_or(Value::Null),
            },
            RawContentPart::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ContentPart::ToolResult {
                tool_use_id,
                content,
                is_error,
            },
            RawContentPart::Unknown => ContentPart::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawContentPart::deserialize(deserializer).map(ContentPart::from)
    }
}

impl ContentPart {
    /// Create a text content part
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    /// Create a tool use content part
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        ContentPart::ToolUse {
            id: id.into(),
            name: Some(name.into()),
            input,
        }
    }

    /// Create a successful tool result content part
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        ContentPart::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Create a failed tool result content part
    pub fn tool_error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        ContentPart::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: error.into(),
            is_error: true,
        }
    }

    /// True for a tool-use item
    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentPart::ToolUse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_message_creation() {
        let user = ChatMessage::user("Hello");
        assert_eq!(user.role, MessageRole::User);
        assert_eq!(user.text(), Some("Hello"));

        let asst = ChatMessage::assistant("Hi there!");
        assert_eq!(asst.role, MessageRole::Assistant);
    }

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::user("Hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"content\":\"Hello\""));
    }

    #[test]
    fn test_tool_use_aliases() {
        let part: ContentPart = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "tu_1",
            "tool_name": "mem_read_graph",
            "tool_input": {"depth": 2}
        }))
        .unwrap();

        assert_eq!(
            part,
            ContentPart::tool_use("tu_1", "mem_read_graph", json!({"depth": 2}))
        );

        let part: ContentPart = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "tu_2",
            "name": "x",
            "arguments": {"a": 1}
        }))
        .unwrap();
        assert!(matches!(part, ContentPart::ToolUse { input, .. } if input == json!({"a": 1})));
    }

    #[test]
    fn test_tool_use_without_name() {
        let part: ContentPart =
            serde_json::from_value(json!({"type": "tool_use", "id": "tu_1"})).unwrap();

        match part {
            ContentPart::ToolUse { name, input, .. } => {
                assert!(name.is_none());
                assert!(input.is_null());
            }
            other => panic!("unexpected part: {:?}", other),
        }
    }

    #[test]
    fn test_tool_use_with_non_string_name() {
        let part: ContentPart =
            serde_json::from_value(json!({"type": "tool_use", "id": "tu_1", "name": 42})).unwrap();
        assert!(matches!(part, ContentPart::ToolUse { name: None, .. }));

        let part: ContentPart =
            serde_json::from_value(json!({"type": "tool_use", "id": "tu_1", "name": "  "})).unwrap();
        assert!(matches!(part, ContentPart::ToolUse { name: None, .. }));
    }

    #[test]
    fn test_tool_use_with_null_or_numeric_id() {
        let part: ContentPart =
            serde_json::from_value(json!({"type": "tool_use", "id": null, "name": "x"})).unwrap();
        assert!(matches!(part, ContentPart::ToolUse { ref id, .. } if id.is_empty()));

        let part: ContentPart =
            serde_json::from_value(json!({"type": "tool_use", "id": 7, "name": "x"})).unwrap();
        assert!(matches!(part, ContentPart::ToolUse { ref id, .. } if id.is_empty()));
    }

    #[test]
    fn test_tool_use_with_both_name_fields_prefers_tool_name() {
        let part: ContentPart = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "tu_1",
            "name": "read_graph",
            "tool_name": "mem_read_graph",
            "input": {}
        }))
        .unwrap();
        assert_eq!(part, ContentPart::tool_use("tu_1", "mem_read_graph", json!({})));

        let part: ContentPart = serde_json::from_value(json!({
            "type": "tool_use",
            "id": "tu_2",
            "name": "read_graph",
            "tool_name": null
        }))
        .unwrap();
        assert!(matches!(part, ContentPart::ToolUse { name: Some(ref n), .. } if n == "read_graph"));
    }

    #[test]
    fn test_mistyped_tool_use_keeps_the_rest_of_the_message() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me look"},
                {"type": "tool_use", "id": null, "name": 42},
                {"type": "tool_use", "id": "tu_2", "name": "mem_read_graph", "input": {}}
            ]
        }))
        .unwrap();

        match &msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(parts[1], ContentPart::ToolUse { name: None, .. }));
                assert_eq!(parts[2], ContentPart::tool_use("tu_2", "mem_read_graph", json!({})));
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_part_type_is_not_fatal() {
        let msg: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "done"}
            ]
        }))
        .unwrap();

        match &msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts[0], ContentPart::Unknown);
                assert_eq!(parts[1], ContentPart::text("done"));
            }
            other => panic!("unexpected content: {:?}", other),
        }
        assert_eq!(msg.joined_text(), "done");
    }

    #[test]
    fn test_tool_result_error_flag() {
        let ok = serde_json::to_value(ContentPart::tool_result("tu_1", "fine")).unwrap();
        assert!(ok.get("is_error").is_none());

        let err = serde_json::to_value(ContentPart::tool_error("tu_1", "boom")).unwrap();
        assert_eq!(err["is_error"], json!(true));
        assert_eq!(err["type"], json!("tool_result"));
    }
}
