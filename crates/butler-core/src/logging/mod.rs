//! Logging abstractions for runtime-agnostic logging

mod traits;
mod noop;
mod memory;
mod tracing_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use memory::{LogLevel, LogRecord, MemoryLogger};
pub use tracing_logger::TracingLogger;
