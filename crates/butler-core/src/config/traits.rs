//! Configuration provider trait

use async_trait::async_trait;

use super::server::ServerConfig;
use super::settings::ButlerConfig;

/// Configuration provider abstraction
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing
/// - `FileConfigProvider`: Reads from YAML file (~/.config/butler/config.yaml)
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Load and validate the full configuration
    async fn load(&self) -> ConfigResult<ButlerConfig>;

    /// Register a new provider
    async fn add_server(&self, name: &str, server: ServerConfig) -> ConfigResult<()>;

    /// Remove a provider registration
    async fn remove_server(&self, name: &str) -> ConfigResult<()>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    #[error("Server already exists: {0}")]
    ServerExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
