//! Mock chat model for testing
//!
//! Provides deterministic, configurable responses without network
//! dependencies. Every request is recorded so tests can inspect the
//! transcript and tool catalog the loop sent.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

use super::error::{ProviderError, ProviderResult};
use super::traits::{ChatModel, ChatRequest, ChatResponse};
use crate::logging::Logger;
use crate::types::{ContentPart, MessageRole};

/// Mock response mode
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user text
    #[default]
    Echo,
    /// Return a fixed text response
    Fixed(String),
    /// Return these responses in order, then plain text
    Script(Vec<ChatResponse>),
    /// Request the same tool on every call
    AlwaysToolUse { tool: String, input: Value },
    /// Fail every call
    Error(String),
}

/// Mock chat model for testing
pub struct MockModel {
    mode: MockMode,
    script: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
    logger: Arc<dyn Logger>,
}

impl MockModel {
    /// Create with a specific mode
    pub fn with_mode(mode: MockMode, logger: Arc<dyn Logger>) -> Self {
        let script = match &mode {
            MockMode::Script(responses) => responses.iter().cloned().collect(),
            _ => VecDeque::new(),
        };
        Self {
            mode,
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Create an echo model (echoes back the user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Echo, logger)
    }

    /// Create a fixed response model
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Fixed(response.into()), logger)
    }

    /// Create a scripted model
    pub fn script(responses: Vec<ChatResponse>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Script(responses), logger)
    }

    /// Create a model that never stops calling `tool`
    pub fn always_tool_use(tool: impl Into<String>, input: Value, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(
            MockMode::AlwaysToolUse {
                tool: tool.into(),
                input,
            },
            logger,
        )
    }

    /// Create an error-producing model
    pub fn error(message: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_mode(MockMode::Error(message.into()), logger)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Extract last user text, skipping tool-result messages
    fn last_user_text(request: &ChatRequest) -> String {
        request
            .messages
            .iter()
            .rev()
            .filter(|msg| msg.role == MessageRole::User)
            .map(|msg| msg.joined_text())
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| "Hello from MockModel!".to_string())
    }
}

#[async_trait]
impl ChatModel for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: ChatRequest) -> ProviderResult<ChatResponse> {
        self.logger.debug(&format!(
            "MockModel: complete called with {} messages",
            request.messages.len()
        ));
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len()
        };

        match &self.mode {
            MockMode::Echo => Ok(ChatResponse::text(format!("Echo: {}", Self::last_user_text(&request)))),
            MockMode::Fixed(text) => Ok(ChatResponse::text(text.clone())),
            MockMode::Script(_) => {
                let next = self.script.lock().pop_front();
                Ok(next.unwrap_or_else(|| ChatResponse::text("(script exhausted)")))
            }
            MockMode::AlwaysToolUse { tool, input } => Ok(ChatResponse::with_parts(vec![ContentPart::tool_use(
                format!("toolu_mock_{}", call),
                tool.clone(),
                input.clone(),
            )])),
            MockMode::Error(message) => Err(ProviderError::Other(format!("Mock error: {}", message))),
        }
    }
}
