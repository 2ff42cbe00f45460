//! Line-delimited JSON-RPC envelopes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{TransportError, TransportResult};

/// Method substituted for an empty method name
pub const DEFAULT_LIST_METHOD: &str = "tools/list";

/// Outgoing request, serialized in wire field order
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: &'a str,
    pub method: &'a str,
    pub params: &'a Value,
}

/// Rewrite the empty compatibility method to the default listing method
pub fn effective_method(method: &str) -> &str {
    if method.is_empty() {
        DEFAULT_LIST_METHOD
    } else {
        method
    }
}

/// Serialize one request as a newline-terminated line
pub fn encode_request(id: &str, method: &str, params: &Value) -> TransportResult<String> {
    let request = RpcRequest {
        jsonrpc: "2.0",
        id,
        method,
        params,
    };
    let mut line = serde_json::to_string(&request).map_err(|e| TransportError::Serialize(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Incoming line, interpreted loosely
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl RpcResponse {
    /// Parse one line of provider output
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Correlation id as a string; numeric ids are stringified
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Turn the envelope into the caller's outcome
    pub fn into_outcome(self, server: &str) -> TransportResult<Value> {
        match self.error {
            Some(error) if !error.is_null() => {
                let code = error.get("code").and_then(Value::as_i64);
                let message = match &error {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                };
                Err(TransportError::Remote {
                    server: server.to_string(),
                    code,
                    message,
                })
            }
            _ => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}
