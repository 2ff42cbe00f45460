//! Statically declared tools backed by an external command

use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tokio::time::timeout;

use super::{catalog::model_schema, ToolError, ToolResult};
use crate::config::SpecialToolConfig;
use crate::logging::Logger;
use crate::types::{ModelTool, ToolOutput};

/// A tool that bypasses the registry and runs a fixed command
///
/// Invoked as `<command> <args...> <input[argument]>` through an argument
/// vector, never a shell.
#[derive(Debug, Clone)]
pub struct SpecialTool {
    config: SpecialToolConfig,
}

impl SpecialTool {
    pub fn new(config: SpecialToolConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SpecialToolConfig {
        &self.config
    }

    /// Catalog entry, listed under the bare name
    pub fn model_tool(&self) -> ModelTool {
        ModelTool {
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            input_schema: model_schema(&self.config.input_schema),
        }
    }

    /// Argument vector for one invocation
    pub fn argv(&self, input: &Value) -> ToolResult<Vec<String>> {
        let value = match input.get(&self.config.argument) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => {
                return Err(ToolError::MissingArgument {
                    tool: self.config.name.clone(),
                    argument: self.config.argument.clone(),
                })
            }
            Some(other) => other.to_string(),
        };

        let mut argv = self.config.args.clone();
        argv.push(value);
        Ok(argv)
    }

    pub async fn run(&self, input: &Value, logger: &dyn Logger) -> ToolResult<ToolOutput> {
        let argv = self.argv(input)?;
        logger.info(&format!("Running special tool \"{}\": {}", self.config.name, self.config.command));

        let child = Command::new(&self.config.command)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.failure(format!("failed to start {}: {}", self.config.command, e)))?;

        let output = match timeout(self.config.timeout(), child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.failure(e.to_string()))?,
            Err(_) => {
                logger.warn(&format!("Special tool \"{}\" timed out", self.config.name));
                return Err(self.failure(format!("timed out after {}ms", self.config.timeout_ms)));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(self.failure(message));
        }

        Ok(ToolOutput::new(String::from_utf8_lossy(&output.stdout).trim_end().to_string()))
    }

    fn failure(&self, message: String) -> ToolError {
        ToolError::Special {
            tool: self.config.name.clone(),
            message,
        }
    }
}
