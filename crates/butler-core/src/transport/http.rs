//! HTTP transport for port-based providers
//!
//! `GET /tools` lists capabilities and `POST /execute` invokes one. Freshly
//! spawned providers are often still binding their port, so discovery
//! retries connection failures and 503s with a linear backoff.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use super::error::{TransportError, TransportResult};
use crate::config::ManagerSettings;
use crate::logging::SharedLogger;

/// Linear backoff: attempt `n` waits `n * backoff`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay before the attempt following `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Client for one HTTP provider
pub struct HttpChannel {
    server: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    discovery_timeout: Duration,
    execute_timeout: Duration,
    logger: SharedLogger,
}

impl HttpChannel {
    pub fn new(
        server: impl Into<String>,
        base_url: impl Into<String>,
        client: reqwest::Client,
        settings: &ManagerSettings,
        logger: SharedLogger,
    ) -> Self {
        Self {
            server: server.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::new(settings.http_max_attempts, settings.http_backoff()),
            discovery_timeout: settings.http_discovery_timeout(),
            execute_timeout: settings.http_execute_timeout(),
            logger,
        }
    }

    /// Base URL for a provider listening on a local port
    pub fn local_url(port: u16) -> String {
        format!("http://127.0.0.1:{}", port)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /tools`, retrying while the provider is not yet accepting
    ///
    /// Returns [`TransportError::Unreachable`] once the attempts run out.
    pub async fn fetch_tools(&self) -> TransportResult<Value> {
        let url = format!("{}/tools", self.base_url);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self
                .client
                .get(&url)
                .timeout(self.discovery_timeout)
                .send()
                .await;

            let retry_reason = match &result {
                Ok(response) if response.status() == StatusCode::SERVICE_UNAVAILABLE => {
                    Some("503 Service Unavailable".to_string())
                }
                Ok(_) => None,
                Err(err) if is_connection_failure(err) => Some(err.to_string()),
                Err(_) => None,
            };

            let Some(reason) = retry_reason else {
                return match result {
                    Ok(response) => self.read_discovery(response).await,
                    Err(err) => Err(self.http_error(err)),
                };
            };

            if attempt >= self.retry.max_attempts {
                self.logger.error(&format!(
                    "Failed to discover tools from '{}' after {} attempts: {}",
                    self.server, attempt, reason
                ));
                return Err(TransportError::Unreachable {
                    server: self.server.clone(),
                    attempts: attempt,
                });
            }

            let delay = self.retry.delay_for(attempt);
            self.logger.warn(&format!(
                "Attempt {} to reach '{}' at {} failed ({}). Retrying in {}ms",
                attempt,
                self.server,
                url,
                reason,
                delay.as_millis()
            ));
            tokio::time::sleep(delay).await;
        }
    }

    /// `POST /execute` with `{tool_name, arguments}`
    pub async fn execute(&self, tool_name: &str, arguments: Value) -> TransportResult<Value> {
        let url = format!("{}/execute", self.base_url);
        self.logger.info(&format!(
            "Executing tool '{}' via HTTP on '{}' at {}",
            tool_name, self.server, url
        ));

        let response = self
            .client
            .post(&url)
            .timeout(self.execute_timeout)
            .json(&json!({ "tool_name": tool_name, "arguments": arguments }))
            .send()
            .await
            .map_err(|e| self.http_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.http_error(e))?;
        let body: Option<Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(|b| b.get("error"))
                .filter(|e| !e.is_null())
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            self.logger.error(&format!(
                "Tool '{}' on '{}' failed with {}: {}",
                tool_name,
                self.server,
                status.as_u16(),
                message
            ));
            return Err(TransportError::Status {
                server: self.server.clone(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(body.unwrap_or(Value::String(text)))
    }

    async fn read_discovery(&self, response: reqwest::Response) -> TransportResult<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                server: self.server.clone(),
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
            });
        }
        response.json::<Value>().await.map_err(|e| TransportError::InvalidResponse {
            server: self.server.clone(),
            message: e.to_string(),
        })
    }

    fn http_error(&self, err: reqwest::Error) -> TransportError {
        TransportError::Http {
            server: self.server.clone(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChannel")
            .field("server", &self.server)
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Connection refused or reset anywhere in the error chain
fn is_connection_failure(err: &reqwest::Error) -> bool {
    if err.is_connect() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ) {
                return true;
            }
        }
        source = inner.source();
    }
    false
}
