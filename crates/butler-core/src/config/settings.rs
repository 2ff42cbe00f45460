//! Top-level configuration document

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::server::ServerConfig;
use super::traits::{ConfigError, ConfigResult};

/// Everything butler reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButlerConfig {
    /// Provider registrations keyed by logical name
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,

    #[serde(default)]
    pub manager: ManagerSettings,

    #[serde(default)]
    pub chat: ChatSettings,

    /// Tools dispatched straight to an external command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_tools: Vec<SpecialToolConfig>,
}

impl ButlerConfig {
    /// Validate every registration and special tool
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, server) in &self.servers {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("server name may not be empty".to_string()));
            }
            if let Some(problem) = server.problem() {
                return Err(ConfigError::Invalid(format!("server '{}': {}", name, problem)));
            }
        }
        for tool in &self.special_tools {
            if tool.name.trim().is_empty() {
                return Err(ConfigError::Invalid("special tool name may not be empty".to_string()));
            }
            if tool.command.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "special tool '{}' requires a command",
                    tool.name
                )));
            }
        }
        if self.manager.http_max_attempts == 0 {
            return Err(ConfigError::Invalid("manager.http_max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Knobs for the provider manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Port of the host service; allocation starts right above it
    pub host_port: u16,
    /// Interpreter used for `python` providers
    pub interpreter: String,
    /// Base directory for relative script paths (defaults to the current dir)
    pub project_root: Option<PathBuf>,
    pub stdio_timeout_ms: u64,
    pub http_discovery_timeout_ms: u64,
    pub http_execute_timeout_ms: u64,
    pub http_max_attempts: u32,
    /// Backoff unit, multiplied by the attempt number
    pub http_backoff_ms: u64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            host_port: 3001,
            interpreter: "python".to_string(),
            project_root: None,
            stdio_timeout_ms: 10_000,
            http_discovery_timeout_ms: 5_000,
            http_execute_timeout_ms: 30_000,
            http_max_attempts: 5,
            http_backoff_ms: 1_000,
        }
    }
}

impl ManagerSettings {
    pub fn stdio_timeout(&self) -> Duration {
        Duration::from_millis(self.stdio_timeout_ms)
    }

    pub fn http_discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.http_discovery_timeout_ms)
    }

    pub fn http_execute_timeout(&self) -> Duration {
        Duration::from_millis(self.http_execute_timeout_ms)
    }

    pub fn http_backoff(&self) -> Duration {
        Duration::from_millis(self.http_backoff_ms)
    }

    /// Directory relative script paths resolve against
    pub fn root_dir(&self) -> PathBuf {
        self.project_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Chat model selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// `anthropic` or `mock`
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    /// Hard cap on model calls per conversation turn
    pub max_rounds: usize,
    pub system_prompt: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub api_base: Option<String>,
    pub api_version: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 4000,
            max_rounds: 10,
            system_prompt: "You are Butler, a personal assistant. Use the available tools \
                            whenever they help answer the request."
                .to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_base: None,
            api_version: "2023-06-01".to_string(),
        }
    }
}

/// A statically declared tool backed by an external command
///
/// Invoked as `<command> <args...> <input[argument]>`, never through a shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_special_schema")]
    pub input_schema: Value,
    /// Input field passed as the final argument
    #[serde(default = "default_special_argument")]
    pub argument: String,
    #[serde(default = "default_special_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_special_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "task": {"type": "string", "description": "Task to perform"}
        },
        "required": ["task"]
    })
}

fn default_special_argument() -> String {
    "task".to_string()
}

fn default_special_timeout_ms() -> u64 {
    300_000
}

impl SpecialToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerKind;

    #[test]
    fn test_defaults() {
        let config: ButlerConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.servers.is_empty());
        assert_eq!(config.manager.host_port, 3001);
        assert_eq!(config.manager.http_max_attempts, 5);
        assert_eq!(config.manager.stdio_timeout(), Duration::from_secs(10));
        assert_eq!(config.chat.max_rounds, 10);
        assert_eq!(config.chat.max_tokens, 4000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
servers:
  builtin:
    type: builtin
  local:
    type: python
    command: backend/local_mcp.py
    port: 5005
  mem:
    type: stdio
    command: npx
    args: ["-y", "@modelcontextprotocol/server-memory"]
manager:
  host_port: 4000
  http_backoff_ms: 10
chat:
  provider: mock
special_tools:
  - name: computer_use
    description: Operate the desktop
    command: /usr/bin/python3
    args: [backend/comp_use.py]
"#;
        let config: ButlerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.servers.len(), 3);
        assert_eq!(config.servers["local"].port, Some(5005));
        assert_eq!(config.servers["mem"].kind, ServerKind::Stdio);
        assert_eq!(config.manager.host_port, 4000);
        assert_eq!(config.manager.interpreter, "python");
        assert_eq!(config.chat.provider, "mock");
        assert_eq!(config.special_tools[0].argument, "task");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_port_on_stdio() {
        let yaml = "servers:\n  mem:\n    type: stdio\n    command: cat\n    port: 4000\n";
        let config: ButlerConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mem"));
    }

    #[test]
    fn test_validation_rejects_empty_special_name() {
        let mut config = ButlerConfig::default();
        config.special_tools.push(SpecialToolConfig {
            name: " ".to_string(),
            description: String::new(),
            command: "echo".to_string(),
            args: vec![],
            input_schema: default_special_schema(),
            argument: default_special_argument(),
            timeout_ms: 1000,
        });
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
