//! Logger that forwards to the `tracing` ecosystem

use super::traits::Logger;

/// Forwards every message to the matching `tracing` macro
///
/// The `component` is attached as a structured field so a subscriber can
/// filter or group records by the part of the system that emitted them.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    component: String,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingLogger {
    /// Create a tracing logger tagged with the default component name
    pub fn new() -> Self {
        Self::with_component("butler")
    }

    /// Create a tracing logger with a custom component tag
    pub fn with_component(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// The component tag attached to every record
    pub fn component(&self) -> &str {
        &self.component
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(component = %self.component, "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(component = %self.component, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(component = %self.component, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(component = %self.component, "{}", message);
    }
}
