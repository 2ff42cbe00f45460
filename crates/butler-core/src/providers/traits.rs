//! Chat model trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProviderResult;
use crate::types::{ChatMessage, ContentPart, ModelTool};

/// One non-streaming request to a chat model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier as used by the provider's API
    pub model: String,
    /// System instructions
    pub system: String,
    /// Full message history
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call
    pub tools: Vec<ModelTool>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

/// Structured content returned by a chat model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl ChatResponse {
    /// A response holding a single text item
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(text)],
            stop_reason: Some("end_turn".to_string()),
        }
    }

    /// A response holding the given items
    pub fn with_parts(content: Vec<ContentPart>) -> Self {
        let stop_reason = if content.iter().any(ContentPart::is_tool_use) {
            "tool_use"
        } else {
            "end_turn"
        };
        Self {
            content,
            stop_reason: Some(stop_reason.to_string()),
        }
    }

    pub fn has_tool_use(&self) -> bool {
        self.content.iter().any(ContentPart::is_tool_use)
    }

    /// Concatenated text items
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// A chat model backend
///
/// Each backend (Anthropic, mock) implements this trait.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Get the provider name (e.g., "anthropic")
    fn name(&self) -> &str;

    /// Send one request and wait for the whole response
    async fn complete(&self, request: ChatRequest) -> ProviderResult<ChatResponse>;
}
