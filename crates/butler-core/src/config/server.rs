//! Provider registrations

use serde::{Deserialize, Serialize};

use crate::types::ToolDescriptor;

/// How a provider is hosted and reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// Implemented in-process; no subprocess and no discovery
    Builtin,
    /// Spawned command speaking HTTP on an allocated port
    Command,
    /// Interpreter script speaking HTTP on an allocated port
    Python,
    /// Spawned command speaking line-delimited JSON-RPC over stdio
    Stdio,
}

impl ServerKind {
    /// Whether the provider is reached over HTTP
    pub fn is_http(&self) -> bool {
        !matches!(self, ServerKind::Stdio)
    }

    /// Whether starting the provider spawns a child process
    pub fn spawns_process(&self) -> bool {
        !matches!(self, ServerKind::Builtin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Builtin => "builtin",
            ServerKind::Command => "command",
            ServerKind::Python => "python",
            ServerKind::Stdio => "stdio",
        }
    }
}

impl std::fmt::Display for ServerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One tool-provider registration
///
/// ```yaml
/// servers:
///   mem:
///     type: stdio
///     command: npx
///     args: ["-y", "@modelcontextprotocol/server-memory"]
///   local:
///     type: python
///     command: backend/local_mcp.py
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport kind
    #[serde(rename = "type")]
    pub kind: ServerKind,

    /// Executable, or script path for the `python` kind
    #[serde(default)]
    pub command: String,

    /// Extra arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Fixed port instead of an allocated one (HTTP kinds only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Tools assumed when every stdio discovery probe fails
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_tools: Vec<ToolDescriptor>,
}

impl ServerConfig {
    /// Create a registration of the given kind
    pub fn new(kind: ServerKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
            args: Vec::new(),
            port: None,
            fallback_tools: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        Self::new(ServerKind::Builtin, "")
    }

    pub fn stdio(command: impl Into<String>) -> Self {
        Self::new(ServerKind::Stdio, command)
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self::new(ServerKind::Command, command)
    }

    pub fn python(script: impl Into<String>) -> Self {
        Self::new(ServerKind::Python, script)
    }

    /// Set the argument list
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Pin the provider to a fixed port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Declare tools to fall back on when discovery finds nothing
    pub fn with_fallback_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.fallback_tools = tools;
        self
    }

    /// Check the registration is usable, returning a human-readable reason if not
    pub fn problem(&self) -> Option<String> {
        if self.kind.spawns_process() && self.command.trim().is_empty() {
            return Some(format!("type '{}' requires a command", self.kind));
        }
        if self.port.is_some() && !self.kind.is_http() {
            return Some(format!("type '{}' does not take a port", self.kind));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_flags() {
        assert!(ServerKind::Builtin.is_http());
        assert!(!ServerKind::Builtin.spawns_process());
        assert!(ServerKind::Python.is_http());
        assert!(!ServerKind::Stdio.is_http());
        assert!(ServerKind::Stdio.spawns_process());
    }

    #[test]
    fn test_problem_detection() {
        assert!(ServerConfig::builtin().problem().is_none());
        assert!(ServerConfig::stdio("").problem().is_some());
        assert!(ServerConfig::stdio("cat").with_port(4000).problem().is_some());
        assert!(ServerConfig::command("srv").with_port(4000).problem().is_none());
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = "type: stdio\ncommand: npx\nargs: [\"-y\", \"server-memory\"]\n";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.kind, ServerKind::Stdio);
        assert_eq!(config.args, vec!["-y", "server-memory"]);
        assert!(config.port.is_none());
    }
}
