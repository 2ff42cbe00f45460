//! Anthropic Messages API client

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error::{ProviderError, ProviderResult};
use super::traits::{ChatModel, ChatRequest, ChatResponse};
use crate::config::ChatSettings;
use crate::logging::Logger;

const PROVIDER: &str = "anthropic";
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Non-streaming client for `/v1/messages`
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    api_version: String,
    logger: Arc<dyn Logger>,
}

impl AnthropicModel {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        api_version: impl Into<String>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_version: api_version.into(),
            logger,
        }
    }

    /// Build from chat settings, reading the key from the configured variable
    pub fn from_settings(settings: &ChatSettings, logger: Arc<dyn Logger>) -> ProviderResult<Self> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ProviderError::missing_api_key(PROVIDER, settings.api_key_env.clone()))?;

        Ok(Self::new(
            api_key,
            settings.api_base.clone(),
            settings.api_version.clone(),
            logger,
        ))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request_body(request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": request.messages,
        });
        if !request.tools.is_empty() {
            body["tools"] = json!(request.tools);
        }
        body
    }
}

/// Vendor error message from an error body, if present
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: ChatRequest) -> ProviderResult<ChatResponse> {
        let url = format!("{}/v1/messages", self.api_base);
        self.logger.debug(&format!(
            "Anthropic request: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.len()
        ));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&Self::request_body(&request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 429 {
            let message = error_message(&body).unwrap_or_else(|| "too many requests".to_string());
            return Err(ProviderError::rate_limited(PROVIDER, message));
        }
        if !status.is_success() {
            let message = error_message(&body).unwrap_or(body);
            self.logger.error(&format!("Anthropic API error ({}): {}", status.as_u16(), message));
            return Err(ProviderError::api_error(PROVIDER, status.as_u16(), message));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(PROVIDER, e.to_string()))?;
        self.logger.debug(&format!(
            "Anthropic response: {} items, stop_reason={:?}",
            parsed.content.len(),
            parsed.stop_reason
        ));
        Ok(parsed)
    }
}
