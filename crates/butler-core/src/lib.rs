//! Butler Core
//!
//! Multi-server tool orchestration for a chat assistant. Tool providers run
//! as child processes (stdio JSON-RPC or local HTTP) or in-process; their
//! tools are discovered, registered under `<server>_<tool>` and exposed to
//! a chat model that calls them in a bounded loop.
//!
//! ## Layers
//!
//! - `transport`: one correlated request/response over stdio or HTTP
//! - `supervisor`: spawn, watch and tear down provider processes
//! - `discovery`: probe providers for their tool lists
//! - `tools` and [`ToolManager`]: registry, resolution and dispatch
//! - `orchestrator`: the model / tool-call cycle for one turn
//!
//! ```rust,ignore
//! use butler_core::{ToolManager, ToolLoop, create_model, TracingLogger};
//!
//! let logger = Arc::new(TracingLogger::new());
//! let manager = Arc::new(ToolManager::new(&config, logger.clone()));
//! manager.start_all();
//! manager.discover_all().await;
//!
//! let model = create_model(&config.chat, logger.clone())?;
//! let tool_loop = ToolLoop::new(model, manager.clone(), config.chat.clone(), logger);
//! let outcome = tool_loop.run_turn(vec![ChatMessage::user("What do you remember?")]).await?;
//! ```

pub mod config;
pub mod discovery;
pub mod logging;
pub mod manager;
pub mod orchestrator;
pub mod providers;
pub mod supervisor;
pub mod tools;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use types::{ChatMessage, ContentPart, MessageContent, MessageRole, ModelTool, ToolDescriptor, ToolOutput};

pub use logging::{Logger, MemoryLogger, NoOpLogger, SharedLogger, TracingLogger};

pub use config::{
    ButlerConfig, ChatSettings, ConfigError, ConfigProvider, FileConfigProvider, ManagerSettings,
    MemoryConfigProvider, ServerConfig, ServerKind, SpecialToolConfig,
};

pub use transport::{HttpChannel, RpcPeer, StdioChannel, TransportError, TransportResult};

pub use supervisor::{LifecycleHook, ProviderSession, Supervisor, SupervisorError};

pub use discovery::{DiscoveryReport, DiscoverySource, ServerDiscovery, StdioProbe};

pub use tools::{ToolError, ToolExecutor, ToolRegistry, ToolRoute};

pub use manager::{StartReport, ToolManager};

pub use providers::{create_model, ChatModel, ChatRequest, ChatResponse, MockModel, ProviderError};

pub use orchestrator::{StopReason, ToolLoop, TurnError, TurnOutcome};
