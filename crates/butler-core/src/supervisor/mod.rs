//! Process supervisor
//!
//! Owns the spawn/monitor/kill lifecycle of every provider. Each spawned
//! child is moved into a watcher task; the session keeps only a kill
//! handle. When a child exits, the watcher fails the session's in-flight
//! requests, drops the session from the live table and notifies the
//! [`LifecycleHook`].

mod error;
mod process;
mod session;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::oneshot;

pub use error::{SupervisorError, SupervisorResult};
pub use process::LaunchSpec;
pub use session::{Endpoint, ProcessHandle, ProviderSession};

use crate::config::{ManagerSettings, ServerConfig, ServerKind};
use crate::logging::SharedLogger;
use crate::transport::{HttpChannel, StdioChannel, TransportError};
use process::{spawn_child, spawn_line_logger, spawn_watcher, WatchContext};

/// Notified when a supervised process goes away
pub trait LifecycleHook: Send + Sync {
    /// The process exited; `code` is `None` when killed by a signal
    fn on_exit(&self, server: &str, code: Option<i32>);

    /// Waiting on the process failed; it has been killed
    fn on_error(&self, server: &str, error: &str);
}

/// Hook that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHook;

impl LifecycleHook for NoOpHook {
    fn on_exit(&self, _server: &str, _code: Option<i32>) {}
    fn on_error(&self, _server: &str, _error: &str) {}
}

/// Live sessions keyed by provider name
#[derive(Default)]
pub struct SessionTable {
    sessions: RwLock<BTreeMap<String, Arc<ProviderSession>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProviderSession>> {
        self.sessions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.read().contains_key(name)
    }

    /// Insert unless a session is already live under the same name
    pub fn insert(&self, session: Arc<ProviderSession>) -> SupervisorResult<()> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(session.name()) {
            return Err(SupervisorError::AlreadyRunning(session.name().to_string()));
        }
        sessions.insert(session.name().to_string(), session);
        Ok(())
    }

    /// Remove `name` only if it still maps to `session`
    ///
    /// A restarted provider reuses the name; the old watcher must not
    /// evict its successor.
    pub fn remove_if_same(&self, name: &str, session: &Arc<ProviderSession>) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(name) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(name);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ProviderSession>> {
        self.sessions.write().remove(name)
    }

    /// Names in iteration order
    pub fn names(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<Arc<ProviderSession>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Take every session out of the table
    pub fn drain(&self) -> Vec<Arc<ProviderSession>> {
        std::mem::take(&mut *self.sessions.write()).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

/// Spawns, tracks and tears down provider processes
pub struct Supervisor {
    sessions: Arc<SessionTable>,
    settings: ManagerSettings,
    next_port: AtomicU16,
    http_client: reqwest::Client,
    hook: Arc<dyn LifecycleHook>,
    logger: SharedLogger,
}

impl Supervisor {
    pub fn new(settings: ManagerSettings, hook: Arc<dyn LifecycleHook>, logger: SharedLogger) -> Self {
        let first_port = settings.host_port.saturating_add(1);
        Self {
            sessions: Arc::new(SessionTable::new()),
            settings,
            next_port: AtomicU16::new(first_port),
            http_client: reqwest::Client::new(),
            hook,
            logger,
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    pub fn get(&self, name: &str) -> Option<Arc<ProviderSession>> {
        self.sessions.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.names()
    }

    /// Next port from the monotonically increasing counter
    fn allocate_port(&self) -> u16 {
        self.next_port.fetch_add(1, Ordering::SeqCst)
    }

    /// Start one provider and register its session
    pub fn start(&self, name: &str, config: &ServerConfig) -> SupervisorResult<Arc<ProviderSession>> {
        if self.sessions.contains(name) {
            return Err(SupervisorError::AlreadyRunning(name.to_string()));
        }
        if let Some(message) = config.problem() {
            return Err(SupervisorError::InvalidConfig {
                server: name.to_string(),
                message,
            });
        }

        match config.kind {
            ServerKind::Builtin => {
                let port = config.port.unwrap_or(self.settings.host_port);
                self.logger.info(&format!("Server '{}' is built-in, using port {}", name, port));
                let session = Arc::new(ProviderSession::new(
                    name,
                    config.clone(),
                    Endpoint::Builtin { port },
                    None,
                ));
                self.sessions.insert(Arc::clone(&session))?;
                Ok(session)
            }
            ServerKind::Command | ServerKind::Python => {
                let port = config.port.unwrap_or_else(|| self.allocate_port());
                self.start_http(name, config, port)
            }
            ServerKind::Stdio => self.start_stdio(name, config),
        }
    }

    fn start_http(&self, name: &str, config: &ServerConfig, port: u16) -> SupervisorResult<Arc<ProviderSession>> {
        let spec = self.launch_spec(name, config, Some(port))?;
        self.logger.info(&format!(
            "Starting {} server '{}' on port {}: {}",
            config.kind,
            name,
            port,
            spec.display()
        ));

        let mut child = spawn_child(name, &spec)?;
        if let Some(stdout) = child.stdout.take() {
            spawn_line_logger(name.to_string(), "stdout", stdout, Arc::clone(&self.logger));
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_logger(name.to_string(), "stderr", stderr, Arc::clone(&self.logger));
        }

        let channel = HttpChannel::new(
            name,
            HttpChannel::local_url(port),
            self.http_client.clone(),
            &self.settings,
            Arc::clone(&self.logger),
        );
        self.register_child(name, config, Endpoint::Http { port, channel }, child)
    }

    fn start_stdio(&self, name: &str, config: &ServerConfig) -> SupervisorResult<Arc<ProviderSession>> {
        let spec = self.launch_spec(name, config, None)?;
        self.logger.info(&format!("Starting stdio server '{}': {}", name, spec.display()));

        let mut child = spawn_child(name, &spec)?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            (stdin, _) => {
                let _ = child.start_kill();
                return Err(SupervisorError::MissingPipe {
                    server: name.to_string(),
                    stream: if stdin.is_none() { "stdin" } else { "stdout" },
                });
            }
        };
        if let Some(stderr) = child.stderr.take() {
            spawn_line_logger(name.to_string(), "stderr", stderr, Arc::clone(&self.logger));
        }

        let channel = StdioChannel::connect(
            name,
            stdin,
            stdout,
            self.settings.stdio_timeout(),
            Arc::clone(&self.logger),
        );
        self.register_child(
            name,
            config,
            Endpoint::Stdio {
                channel: Arc::new(channel),
            },
            child,
        )
    }

    fn launch_spec(&self, name: &str, config: &ServerConfig, port: Option<u16>) -> SupervisorResult<LaunchSpec> {
        LaunchSpec::for_config(config, port, &self.settings).ok_or_else(|| SupervisorError::InvalidConfig {
            server: name.to_string(),
            message: format!("type '{}' has nothing to launch", config.kind),
        })
    }

    fn register_child(
        &self,
        name: &str,
        config: &ServerConfig,
        endpoint: Endpoint,
        mut child: tokio::process::Child,
    ) -> SupervisorResult<Arc<ProviderSession>> {
        let (kill_tx, kill_rx) = oneshot::channel();
        let handle = ProcessHandle::new(child.id(), kill_tx);
        let session = Arc::new(ProviderSession::new(name, config.clone(), endpoint, Some(handle)));

        if let Err(err) = self.sessions.insert(Arc::clone(&session)) {
            let _ = child.start_kill();
            return Err(err);
        }

        spawn_watcher(
            child,
            kill_rx,
            WatchContext {
                session: Arc::clone(&session),
                sessions: Arc::clone(&self.sessions),
                hook: Arc::clone(&self.hook),
                logger: Arc::clone(&self.logger),
            },
        );
        Ok(session)
    }

    /// Register a session created elsewhere (in-process or pre-connected)
    pub fn attach(&self, session: Arc<ProviderSession>) -> SupervisorResult<()> {
        self.sessions.insert(session)
    }

    /// Kill one provider; its watcher finishes the teardown
    pub fn kill(&self, name: &str) -> bool {
        match self.sessions.get(name) {
            Some(session) => {
                self.logger.info(&format!("Stopping server '{}'", name));
                session.kill()
            }
            None => false,
        }
    }

    /// Fail all in-flight requests, then kill every process
    ///
    /// Synchronous and idempotent; returns how many sessions were stopped.
    pub fn stop_all(&self) -> usize {
        let sessions = self.sessions.drain();
        for session in &sessions {
            session.fail_pending(&TransportError::Shutdown {
                server: session.name().to_string(),
            });
        }
        for session in &sessions {
            if session.has_process() {
                self.logger.info(&format!("Stopping server '{}'", session.name()));
                session.kill();
            }
        }
        sessions.len()
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("sessions", &self.sessions.names())
            .field("next_port", &self.next_port.load(Ordering::SeqCst))
            .finish()
    }
}
