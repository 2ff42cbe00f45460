//! Supervisor error types

use thiserror::Error;

/// Errors from starting a provider
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to spawn '{server}' ({program}): {message}")]
    Spawn {
        server: String,
        program: String,
        message: String,
    },

    #[error("'{server}' started without a {stream} pipe")]
    MissingPipe { server: String, stream: &'static str },

    #[error("server '{0}' is already running")]
    AlreadyRunning(String),

    #[error("server '{server}' is misconfigured: {message}")]
    InvalidConfig { server: String, message: String },
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
