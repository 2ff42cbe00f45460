//! Transport error types

use thiserror::Error;

/// Errors from delivering one request to one provider
///
/// `Clone` so that a single failure (process exit, shutdown) can be fanned
/// out to every pending correlation entry of a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The child's stdin is gone
    #[error("stdin of '{server}' is not writable")]
    NotWritable { server: String },

    /// Writing the request line failed
    #[error("failed to write to '{server}': {message}")]
    Write { server: String, message: String },

    /// No response arrived in time
    #[error("request '{method}' to '{server}' timed out after {timeout_ms}ms")]
    Timeout {
        server: String,
        method: String,
        timeout_ms: u64,
    },

    /// The provider process went away while the request was in flight
    #[error("process for '{server}' exited ({})", exit_code_label(.code))]
    ProcessExited { server: String, code: Option<i32> },

    /// The provider answered with an error object
    #[error("'{server}' returned an error: {message}")]
    Remote {
        server: String,
        code: Option<i64>,
        message: String,
    },

    /// The manager is shutting down
    #[error("'{server}' is shutting down")]
    Shutdown { server: String },

    /// HTTP request failed before a response was received
    #[error("HTTP request to '{server}' failed: {message}")]
    Http { server: String, message: String },

    /// HTTP response with a non-success status
    #[error("'{server}' responded {status}: {message}")]
    Status {
        server: String,
        status: u16,
        message: String,
    },

    /// Retries exhausted against an unreachable provider
    #[error("'{server}' unreachable after {attempts} attempts")]
    Unreachable { server: String, attempts: u32 },

    /// Response could not be interpreted
    #[error("invalid response from '{server}': {message}")]
    InvalidResponse { server: String, message: String },

    /// Request could not be serialized
    #[error("failed to serialize request: {0}")]
    Serialize(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl TransportError {
    /// Whether the error was raised by the peer rather than the channel
    pub fn is_remote(&self) -> bool {
        matches!(self, TransportError::Remote { .. })
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_exited_message() {
        let err = TransportError::ProcessExited {
            server: "mem".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "process for 'mem' exited (exit code 1)");

        let err = TransportError::ProcessExited {
            server: "mem".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_is_remote() {
        let remote = TransportError::Remote {
            server: "mem".to_string(),
            code: Some(-32601),
            message: "Method not found".to_string(),
        };
        assert!(remote.is_remote());
        assert!(!TransportError::Shutdown { server: "mem".to_string() }.is_remote());
    }
}
