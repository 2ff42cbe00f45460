//! Tool-use orchestration loop

mod turn;

pub use turn::{StopReason, ToolInvocation, ToolLoop, TurnError, TurnOutcome};
