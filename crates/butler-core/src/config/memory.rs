//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::ServerConfig;
use super::settings::ButlerConfig;
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<ButlerConfig>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with an initial document
    pub fn with_config(config: ButlerConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the document directly (useful for testing)
    pub fn set_config(&self, config: ButlerConfig) {
        *self.config.write() = config;
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn load(&self) -> ConfigResult<ButlerConfig> {
        let config = self.config.read().clone();
        config.validate()?;
        Ok(config)
    }

    async fn add_server(&self, name: &str, server: ServerConfig) -> ConfigResult<()> {
        let mut guard = self.config.write();
        if guard.servers.contains_key(name) {
            return Err(ConfigError::ServerExists(name.to_string()));
        }
        guard.servers.insert(name.to_string(), server);
        Ok(())
    }

    async fn remove_server(&self, name: &str) -> ConfigResult<()> {
        let mut guard = self.config.write();
        guard
            .servers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }
}
