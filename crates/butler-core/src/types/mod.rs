//! Core types shared across the crate
//!
//! Transcript items exchanged with the chat model and the tool shapes
//! exchanged with providers.

mod message;
mod tool;

pub use message::{ChatMessage, ContentPart, MessageContent, MessageRole};
pub use tool::{ModelTool, ToolDescriptor, ToolOutput};
