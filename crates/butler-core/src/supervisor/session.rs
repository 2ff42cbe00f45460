//! Runtime state of one started provider

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use crate::config::{ServerConfig, ServerKind};
use crate::transport::{HttpChannel, StdioChannel, TransportError};
use crate::types::ToolDescriptor;

/// How requests reach the provider
pub enum Endpoint {
    /// In-process provider reachable on the host's own port
    Builtin { port: u16 },
    /// Spawned provider listening on `port`
    Http { port: u16, channel: HttpChannel },
    /// Spawned provider speaking JSON-RPC over its stdio
    Stdio { channel: Arc<StdioChannel> },
}

/// Control handle for the child process owned by a watcher task
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessHandle {
    pub fn new(pid: Option<u32>, kill_tx: oneshot::Sender<()>) -> Self {
        Self {
            pid,
            kill_tx: Mutex::new(Some(kill_tx)),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the watcher to kill the process; false if already requested
    pub fn kill(&self) -> bool {
        match self.kill_tx.lock().take() {
            // The watcher may already have observed an exit
            Some(tx) => {
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// One live provider
pub struct ProviderSession {
    name: String,
    config: ServerConfig,
    endpoint: Endpoint,
    process: Option<ProcessHandle>,
    tools: RwLock<Vec<ToolDescriptor>>,
}

impl ProviderSession {
    pub fn new(
        name: impl Into<String>,
        config: ServerConfig,
        endpoint: Endpoint,
        process: Option<ProcessHandle>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            endpoint,
            process,
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Session for a built-in provider
    pub fn builtin(name: impl Into<String>, port: u16) -> Self {
        Self::new(name, ServerConfig::builtin(), Endpoint::Builtin { port }, None)
    }

    /// Session over an already-connected stdio channel
    pub fn stdio(name: impl Into<String>, config: ServerConfig, channel: Arc<StdioChannel>) -> Self {
        Self::new(name, config, Endpoint::Stdio { channel }, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ServerKind {
        self.config.kind
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Assigned port; `None` for stdio providers
    pub fn port(&self) -> Option<u16> {
        match &self.endpoint {
            Endpoint::Builtin { port } | Endpoint::Http { port, .. } => Some(*port),
            Endpoint::Stdio { .. } => None,
        }
    }

    pub fn stdio_channel(&self) -> Option<&Arc<StdioChannel>> {
        match &self.endpoint {
            Endpoint::Stdio { channel } => Some(channel),
            _ => None,
        }
    }

    pub fn http_channel(&self) -> Option<&HttpChannel> {
        match &self.endpoint {
            Endpoint::Http { channel, .. } => Some(channel),
            _ => None,
        }
    }

    pub fn is_stdio(&self) -> bool {
        matches!(self.endpoint, Endpoint::Stdio { .. })
    }

    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ProcessHandle::pid)
    }

    /// Snapshot of the tools discovered so far
    pub fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().clone()
    }

    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        *self.tools.write() = tools;
    }

    /// Requests in flight on the stdio channel
    pub fn pending_count(&self) -> usize {
        self.stdio_channel().map(|c| c.pending_count()).unwrap_or(0)
    }

    /// Fail every in-flight request and refuse new ones
    pub fn fail_pending(&self, error: &TransportError) -> usize {
        match &self.endpoint {
            Endpoint::Stdio { channel } => channel.close(error),
            _ => 0,
        }
    }

    /// Request termination of the child process, if any
    pub fn kill(&self) -> bool {
        self.process.as_ref().map(ProcessHandle::kill).unwrap_or(false)
    }
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("name", &self.name)
            .field("kind", &self.config.kind)
            .field("port", &self.port())
            .field("pid", &self.pid())
            .field("tools", &self.tools.read().len())
            .finish()
    }
}
