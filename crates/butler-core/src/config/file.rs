//! File-based configuration provider (YAML)
//!
//! Supports user-level (~/.config/butler/config.yaml) and workspace-level
//! (.config/butler/config.yaml) config, or any explicit path.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::server::ServerConfig;
use super::settings::ButlerConfig;
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// User-level config (~/.config/butler/config.yaml)
    User,
    /// Workspace-level config (.config/butler/config.yaml in workspace root)
    Workspace,
    /// A path given on the command line
    Explicit,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
            ConfigLevel::Explicit => "explicit",
        }
    }
}

/// File-based configuration provider
///
/// A missing file loads as the default document, so a fresh install starts
/// with no providers rather than an error.
///
/// # Example
///
/// ```no_run
/// use butler_core::config::FileConfigProvider;
///
/// // User-level config
/// let user_config = FileConfigProvider::user();
///
/// // Workspace-level config
/// let workspace_config = FileConfigProvider::workspace("/path/to/workspace");
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<ButlerConfig>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// Config provider for an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ConfigLevel::Explicit)
    }

    /// Create a user-level config provider (~/.config/butler/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        let path = config_dir.join("butler").join("config.yaml");
        Self::new(path, ConfigLevel::User)
    }

    /// Create a workspace-level config provider (.config/butler/config.yaml)
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root.as_ref().join(".config").join("butler").join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the config level
    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> ConfigResult<ButlerConfig> {
        if !self.path.exists() {
            return Ok(ButlerConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ButlerConfig::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    fn save(&self, config: &ButlerConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(config)?;
        fs::write(&self.path, content)?;

        *self.cache.write() = Some(config.clone());
        Ok(())
    }

    /// Get cached or read config
    fn get_config(&self) -> ConfigResult<ButlerConfig> {
        if let Some(config) = self.cache.read().as_ref() {
            return Ok(config.clone());
        }

        let config = self.read()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<ButlerConfig> {
        let config = self.read()?;
        *self.cache.write() = Some(config.clone());
        Ok(config)
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self) -> ConfigResult<ButlerConfig> {
        let config = self.get_config()?;
        config.validate()?;
        Ok(config)
    }

    async fn add_server(&self, name: &str, server: ServerConfig) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        if config.servers.contains_key(name) {
            return Err(ConfigError::ServerExists(name.to_string()));
        }
        config.servers.insert(name.to_string(), server);
        self.save(&config)
    }

    async fn remove_server(&self, name: &str) -> ConfigResult<()> {
        let mut config = self.get_config()?;
        if config.servers.remove(name).is_none() {
            return Err(ConfigError::ServerNotFound(name.to_string()));
        }
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let provider = FileConfigProvider::at(dir.path().join("config.yaml"));

        assert!(!provider.exists());
        let config = provider.load().await.unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.manager.host_port, 3001);
    }

    #[tokio::test]
    async fn test_add_server_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let provider = FileConfigProvider::at(&path);

        provider
            .add_server("mem", ServerConfig::stdio("npx").with_args(["-y", "server-memory"]))
            .await
            .unwrap();
        assert!(provider.exists());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("mem"));
        assert!(content.contains("stdio"));

        let reloaded = provider.reload().unwrap();
        assert_eq!(reloaded.servers["mem"].kind, ServerKind::Stdio);

        provider.remove_server("mem").await.unwrap();
        assert!(provider.reload().unwrap().servers.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers: [not, a, map").unwrap();

        let provider = FileConfigProvider::at(&path);
        assert!(matches!(provider.load().await, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_workspace_path() {
        let provider = FileConfigProvider::workspace("/srv/project");
        assert_eq!(provider.level(), ConfigLevel::Workspace);
        assert!(provider.path().ends_with(".config/butler/config.yaml"));
    }
}
