//! Tool registry and routing
//!
//! ```text
//! model tool_use ──► ToolManager::execute ──► ToolRegistry::lookup
//!                                               │
//!                     ┌─────────────────────────┼──────────────────┐
//!                     ▼                         ▼                  ▼
//!               Stdio(ToolRef)             Http(ToolRef)      Special(name)
//!          tools/call, then <name>       POST /execute      argv command
//! ```
//!
//! The registry is the only structure consulted at dispatch time; session
//! tool lists only feed it during discovery.

mod catalog;
mod registry;
mod router;
mod special;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use catalog::{describe, model_schema, provider_tool};
pub use registry::{namespaced, ToolRef, ToolRegistry, ToolRoute, NAMESPACE_SEPARATOR};
pub use router::{invoke_stdio, local_invocation_name, name_candidates, normalize_result, CALL_METHOD};
pub use special::SpecialTool;

use crate::transport::TransportError;
use crate::types::{ModelTool, ToolOutput};

/// Errors from resolving or executing a tool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool \"{name}\" not found. Known tools: {}", known_list(.known))]
    NotFound { name: String, known: Vec<String> },

    #[error("Tool \"{name}\" is ambiguous: {}", .candidates.join(", "))]
    Ambiguous { name: String, candidates: Vec<String> },

    #[error("Server \"{server}\" for tool \"{tool}\" is not running")]
    ServerUnavailable { server: String, tool: String },

    #[error("Server \"{server}\" does not support tool execution (tool \"{tool}\")")]
    Unsupported { server: String, tool: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Tool \"{tool}\" requires argument \"{argument}\"")]
    MissingArgument { tool: String, argument: String },

    #[error("Tool \"{tool}\" failed: {message}")]
    Special { tool: String, message: String },
}

fn known_list(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".to_string()
    } else {
        known.join(", ")
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Something that can list and run tools for the chat model
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Every tool the model may call
    fn catalog(&self) -> Vec<ModelTool>;

    /// Run one tool by its model-facing name
    async fn execute(&self, name: &str, arguments: Value) -> ToolResult<ToolOutput>;
}
