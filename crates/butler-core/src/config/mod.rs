//! Configuration provider abstractions
//!
//! Supports multiple configuration sources:
//! - `MemoryConfigProvider`: In-memory for testing
//! - `FileConfigProvider`: YAML file-based (user/workspace level or explicit path)

mod traits;
mod memory;
mod file;
mod server;
mod settings;

pub use traits::{ConfigProvider, ConfigError, ConfigResult};
pub use memory::MemoryConfigProvider;
pub use file::{FileConfigProvider, ConfigLevel};
pub use server::{ServerConfig, ServerKind};
pub use settings::{ButlerConfig, ChatSettings, ManagerSettings, SpecialToolConfig};
