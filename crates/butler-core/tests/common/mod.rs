//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use butler_core::config::{ButlerConfig, ManagerSettings, ServerConfig};
use butler_core::logging::{NoOpLogger, SharedLogger};
use butler_core::supervisor::ProviderSession;
use butler_core::transport::StdioChannel;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// How a fake provider answers one request
pub enum Reply {
    Result(Value),
    Error(String),
    Silence,
}

pub fn logger() -> SharedLogger {
    Arc::new(NoOpLogger::new())
}

/// Settings with short timeouts and backoff for tests
pub fn fast_settings() -> ManagerSettings {
    ManagerSettings {
        stdio_timeout_ms: 2_000,
        http_discovery_timeout_ms: 1_000,
        http_execute_timeout_ms: 1_000,
        http_backoff_ms: 10,
        ..ManagerSettings::default()
    }
}

pub fn fast_config() -> ButlerConfig {
    ButlerConfig {
        manager: fast_settings(),
        ..ButlerConfig::default()
    }
}

/// In-memory stdio provider answering with `respond(method, params)`
pub fn fake_stdio_channel<F>(name: &str, respond: F) -> Arc<StdioChannel>
where
    F: Fn(&str, &Value) -> Reply + Send + 'static,
{
    let (client, provider) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (provider_read, mut provider_write) = tokio::io::split(provider);

    tokio::spawn(async move {
        let mut lines = BufReader::new(provider_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(request) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let id = request["id"].clone();
            let method = request["method"].as_str().unwrap_or_default().to_string();
            let response = match respond(&method, &request["params"]) {
                Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                Reply::Error(message) => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": message}}),
                Reply::Silence => continue,
            };
            let mut out = response.to_string();
            out.push('\n');
            if provider_write.write_all(out.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    Arc::new(StdioChannel::connect(
        name,
        client_write,
        client_read,
        Duration::from_millis(fast_settings().stdio_timeout_ms),
        logger(),
    ))
}

/// Session over a fake stdio provider
pub fn fake_stdio_session<F>(name: &str, respond: F) -> Arc<ProviderSession>
where
    F: Fn(&str, &Value) -> Reply + Send + 'static,
{
    Arc::new(ProviderSession::stdio(
        name,
        ServerConfig::stdio(format!("{}-server", name)),
        fake_stdio_channel(name, respond),
    ))
}

/// The knowledge-graph provider used across scenarios
pub fn memory_provider(method: &str, params: &Value) -> Reply {
    match method {
        "tools/list" => Reply::Result(json!({
            "tools": [
                {"name": "read_graph", "description": "Read the entire knowledge graph", "inputSchema": {}},
                {"name": "search_nodes", "description": "Search nodes", "inputSchema": {
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }}
            ]
        })),
        "tools/call" => match params["name"].as_str() {
            Some("read_graph") => Reply::Result(json!({"entities": [{"name": "Alice"}]})),
            Some("search_nodes") => Reply::Result(json!(format!(
                "found {}",
                params["arguments"]["query"].as_str().unwrap_or_default()
            ))),
            _ => Reply::Error("unknown tool".to_string()),
        },
        _ => Reply::Error(format!("Method not found: {}", method)),
    }
}
