//! Chat model clients
//!
//! The orchestration loop talks to the model through the [`ChatModel`]
//! trait. `AnthropicModel` calls the Messages API; `MockModel` is kept for
//! tests and offline runs.

mod anthropic;
mod error;
mod mock;
mod traits;

pub use anthropic::AnthropicModel;
pub use error::{ProviderError, ProviderResult};
pub use mock::{MockMode, MockModel};
pub use traits::{ChatModel, ChatRequest, ChatResponse};

use crate::config::ChatSettings;
use crate::logging::Logger;
use std::sync::Arc;

/// Create the chat model named by `settings.provider`
pub fn create_model(settings: &ChatSettings, logger: Arc<dyn Logger>) -> ProviderResult<Arc<dyn ChatModel>> {
    match settings.provider.to_lowercase().as_str() {
        "anthropic" => Ok(Arc::new(AnthropicModel::from_settings(settings, logger)?)),
        "mock" => Ok(Arc::new(MockModel::echo(logger))),
        other => Err(ProviderError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_create_mock() {
        let settings = ChatSettings {
            provider: "Mock".to_string(),
            ..ChatSettings::default()
        };
        let model = create_model(&settings, Arc::new(NoOpLogger::new())).unwrap();
        assert_eq!(model.name(), "mock");
    }

    #[test]
    fn test_unknown_provider() {
        let settings = ChatSettings {
            provider: "openai".to_string(),
            ..ChatSettings::default()
        };
        let err = create_model(&settings, Arc::new(NoOpLogger::new())).err().unwrap();
        assert!(matches!(err, ProviderError::UnsupportedProvider(_)));
    }
}
