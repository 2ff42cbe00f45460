//! Request/response correlation over a child's stdio
//!
//! Requests are written to the child's stdin as one JSON object per line.
//! A reader task consumes stdout line by line and completes the matching
//! pending entry. Lines that are not JSON, or that carry an id nobody is
//! waiting for, are logged and dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::envelope::{effective_method, encode_request, RpcResponse};
use super::error::{TransportError, TransportResult};
use super::pending::PendingTable;
use super::RpcPeer;
use crate::logging::{Logger, SharedLogger};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Longest slice of an offending line echoed into the log
const LOG_PREVIEW: usize = 200;

/// One stdio-connected provider
pub struct StdioChannel {
    server: String,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
    pending: Arc<PendingTable>,
    timeout: Duration,
    logger: SharedLogger,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl StdioChannel {
    /// Wrap a writer/reader pair and start consuming the reader
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect<W, R>(
        server: impl Into<String>,
        writer: W,
        reader: R,
        timeout: Duration,
        logger: SharedLogger,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let server = server.into();
        let pending = Arc::new(PendingTable::new());
        let handle = spawn_reader(server.clone(), reader, Arc::clone(&pending), Arc::clone(&logger));

        Self {
            server,
            writer: tokio::sync::Mutex::new(Some(Box::new(writer))),
            closed: AtomicBool::new(false),
            pending,
            timeout,
            logger,
            reader: parking_lot::Mutex::new(Some(handle)),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Number of requests still awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Send one request and wait for its correlated response
    pub async fn call(&self, method: &str, params: Value) -> TransportResult<Value> {
        let method = effective_method(method);
        let id = Uuid::new_v4().to_string();
        let line = encode_request(&id, method, &params)?;

        let mut rx = self.pending.register(id.clone(), method);
        if let Err(err) = self.write_line(&line).await {
            self.pending.discard(&id);
            self.logger.error(&format!("[{}] failed to send '{}': {}", self.server, method, err));
            return Err(err);
        }
        self.logger.debug(&format!("[{}] -> {} ({})", self.server, method, id));

        match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(TransportError::Shutdown {
                server: self.server.clone(),
            }),
            Err(_) => {
                if self.pending.discard(&id) {
                    self.logger.warn(&format!(
                        "[{}] request '{}' ({}) timed out after {}ms",
                        self.server,
                        method,
                        id,
                        self.timeout.as_millis()
                    ));
                    Err(self.timeout_error(method))
                } else {
                    // Completed between the timer firing and the discard
                    rx.try_recv().unwrap_or_else(|_| Err(self.timeout_error(method)))
                }
            }
        }
    }

    /// Fail every pending request and refuse new ones
    ///
    /// Synchronous so it can run from exit watchers and `Drop`.
    pub fn close(&self, error: &TransportError) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.take();
        }
        let failed = self.pending.fail_all(error);
        if failed > 0 {
            self.logger.warn(&format!(
                "[{}] failed {} pending request(s): {}",
                self.server, failed, error
            ));
        }
        failed
    }

    async fn write_line(&self, line: &str) -> TransportResult<()> {
        let mut guard = self.writer.lock().await;
        if self.is_closed() {
            return Err(self.not_writable());
        }
        let writer = guard.as_mut().ok_or_else(|| self.not_writable())?;

        writer.write_all(line.as_bytes()).await.map_err(|e| self.write_error(e))?;
        writer.flush().await.map_err(|e| self.write_error(e))?;
        Ok(())
    }

    fn not_writable(&self) -> TransportError {
        TransportError::NotWritable {
            server: self.server.clone(),
        }
    }

    fn write_error(&self, err: std::io::Error) -> TransportError {
        TransportError::Write {
            server: self.server.clone(),
            message: err.to_string(),
        }
    }

    fn timeout_error(&self, method: &str) -> TransportError {
        TransportError::Timeout {
            server: self.server.clone(),
            method: method.to_string(),
            timeout_ms: self.timeout.as_millis() as u64,
        }
    }
}

impl Drop for StdioChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for StdioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioChannel")
            .field("server", &self.server)
            .field("pending", &self.pending.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl RpcPeer for StdioChannel {
    fn server(&self) -> &str {
        &self.server
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        self.call(method, params).await
    }
}

fn spawn_reader<R>(
    server: String,
    reader: R,
    pending: Arc<PendingTable>,
    logger: SharedLogger,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    logger.debug(&format!("[{}] stdout closed", server));
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    dispatch_line(&server, line.trim(), &pending, logger.as_ref());
                }
                Err(err) => {
                    logger.warn(&format!("[{}] stdout read failed: {}", server, err));
                    break;
                }
            }
        }
    })
}

fn dispatch_line(server: &str, line: &str, pending: &PendingTable, logger: &dyn Logger) {
    if line.is_empty() {
        return;
    }

    let response = match RpcResponse::parse(line) {
        Ok(response) => response,
        Err(err) => {
            logger.warn(&format!(
                "[{}] dropping unparseable line ({}): {}",
                server,
                err,
                preview(line)
            ));
            return;
        }
    };

    let Some(id) = response.id_string() else {
        logger.debug(&format!("[{}] ignoring message without id: {}", server, preview(line)));
        return;
    };

    if !pending.resolve(&id, response.into_outcome(server)) {
        logger.warn(&format!("[{}] no pending request for response id {}", server, id));
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(LOG_PREVIEW) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
