//! Child process spawning and exit watching

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use super::error::{SupervisorError, SupervisorResult};
use super::session::ProviderSession;
use super::{LifecycleHook, SessionTable};
use crate::config::{ManagerSettings, ServerConfig, ServerKind};
use crate::logging::SharedLogger;
use crate::transport::TransportError;

/// Program and argument vector for a spawned provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchSpec {
    /// Build the launch vector for `config`
    ///
    /// HTTP kinds get `--port <port>`; `python` scripts resolve relative to
    /// the project root. Returns `None` for built-in providers.
    pub fn for_config(config: &ServerConfig, port: Option<u16>, settings: &ManagerSettings) -> Option<Self> {
        let port_args = || match port {
            Some(port) => vec!["--port".to_string(), port.to_string()],
            None => Vec::new(),
        };

        match config.kind {
            ServerKind::Builtin => None,
            ServerKind::Command => {
                let mut args = config.args.clone();
                args.extend(port_args());
                Some(Self {
                    program: config.command.clone(),
                    args,
                })
            }
            ServerKind::Python => {
                let script = Path::new(&config.command);
                let script = if script.is_absolute() {
                    script.to_path_buf()
                } else {
                    settings.root_dir().join(script)
                };
                let mut args = vec![script.to_string_lossy().into_owned()];
                args.extend(port_args());
                args.extend(config.args.iter().cloned());
                Some(Self {
                    program: settings.interpreter.clone(),
                    args,
                })
            }
            ServerKind::Stdio => Some(Self {
                program: config.command.clone(),
                args: config.args.clone(),
            }),
        }
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Spawn with all three standard streams piped
pub(crate) fn spawn_child(server: &str, spec: &LaunchSpec) -> SupervisorResult<Child> {
    Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SupervisorError::Spawn {
            server: server.to_string(),
            program: spec.program.clone(),
            message: e.to_string(),
        })
}

/// Forward each line of a child stream to the logger
pub(crate) fn spawn_line_logger<R>(server: String, stream_name: &'static str, stream: R, logger: SharedLogger)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if !line.is_empty() {
                        logger.info(&format!("[{} {}] {}", server, stream_name, line));
                    }
                }
            }
        }
    });
}

/// Everything the exit watcher needs besides the child itself
pub(crate) struct WatchContext {
    pub session: Arc<ProviderSession>,
    pub sessions: Arc<SessionTable>,
    pub hook: Arc<dyn LifecycleHook>,
    pub logger: SharedLogger,
}

/// Own the child until it exits or is asked to die
///
/// On exit every pending request of the session is failed with the exit
/// code, the session is removed (if it is still the live one under its
/// name), and the lifecycle hook is told.
pub(crate) fn spawn_watcher(mut child: Child, mut kill_rx: oneshot::Receiver<()>, ctx: WatchContext) {
    tokio::spawn(async move {
        let name = ctx.session.name().to_string();

        let status = tokio::select! {
            status = child.wait() => status,
            _ = &mut kill_rx => {
                ctx.logger.debug(&format!("Killing process for '{}'", name));
                if let Err(err) = child.start_kill() {
                    ctx.logger.warn(&format!("Failed to signal '{}': {}", name, err));
                }
                child.wait().await
            }
        };

        match status {
            Ok(status) => {
                let code = status.code();
                ctx.logger.info(&format!("Server '{}' process exited ({})", name, status));
                ctx.session.fail_pending(&TransportError::ProcessExited {
                    server: name.clone(),
                    code,
                });
                ctx.sessions.remove_if_same(&name, &ctx.session);
                ctx.hook.on_exit(&name, code);
            }
            Err(err) => {
                ctx.logger.error(&format!("Failed to wait on server '{}' process: {}", name, err));
                let _ = child.start_kill();
                ctx.session.fail_pending(&TransportError::ProcessExited {
                    server: name.clone(),
                    code: None,
                });
                ctx.sessions.remove_if_same(&name, &ctx.session);
                ctx.hook.on_error(&name, &err.to_string());
            }
        }
    });
}
