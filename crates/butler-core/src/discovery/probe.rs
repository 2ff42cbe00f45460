//! Stdio discovery probes

use serde_json::{json, Value};
use thiserror::Error;

use super::normalize::{parse_tool_list, parse_tool_list_or_array};
use crate::logging::Logger;
use crate::transport::{RpcPeer, TransportError};
use crate::types::ToolDescriptor;

/// Why one probe did not produce tools
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected payload: {0}")]
    Malformed(String),

    #[error("no tools returned")]
    Empty,
}

/// One way of asking a stdio provider for its tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioProbe {
    /// Empty method, for providers that answer without a named method
    EmptyMethod,
    /// Standard `tools/list`
    ToolsList,
    /// Alternate `list_tools`, which may answer with a bare array
    ListTools,
}

impl StdioProbe {
    /// Probes in the order they are attempted
    pub const ORDER: [StdioProbe; 3] = [StdioProbe::EmptyMethod, StdioProbe::ToolsList, StdioProbe::ListTools];

    pub fn method(&self) -> &'static str {
        match self {
            StdioProbe::EmptyMethod => "",
            StdioProbe::ToolsList => "tools/list",
            StdioProbe::ListTools => "list_tools",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StdioProbe::EmptyMethod => "empty method",
            StdioProbe::ToolsList => "tools/list",
            StdioProbe::ListTools => "list_tools",
        }
    }

    /// Interpret a raw response for this probe
    pub fn interpret(&self, payload: &Value) -> Result<Vec<ToolDescriptor>, ProbeError> {
        let tools = match self {
            StdioProbe::EmptyMethod | StdioProbe::ToolsList => parse_tool_list(payload),
            StdioProbe::ListTools => parse_tool_list_or_array(payload),
        }
        .ok_or_else(|| ProbeError::Malformed(shape_of(payload).to_string()))?;

        if tools.is_empty() {
            return Err(ProbeError::Empty);
        }
        Ok(tools)
    }

    /// Send the probe and interpret the answer
    pub async fn run(&self, peer: &dyn RpcPeer) -> Result<Vec<ToolDescriptor>, ProbeError> {
        let payload = peer.request(self.method(), json!({})).await?;
        self.interpret(&payload)
    }
}

impl std::fmt::Display for StdioProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object without a tools array",
    }
}

/// Try `probes` in order; the first non-empty tool list wins
///
/// On total failure every probe's error is returned in order.
pub async fn first_success(
    peer: &dyn RpcPeer,
    probes: &[StdioProbe],
    logger: &dyn Logger,
) -> Result<(StdioProbe, Vec<ToolDescriptor>), Vec<(StdioProbe, ProbeError)>> {
    let mut failures = Vec::with_capacity(probes.len());
    for probe in probes {
        logger.debug(&format!("{}: trying {} for tool discovery", peer.server(), probe));
        match probe.run(peer).await {
            Ok(tools) => {
                logger.info(&format!(
                    "{}: found {} tools using {}",
                    peer.server(),
                    tools.len(),
                    probe
                ));
                return Ok((*probe, tools));
            }
            Err(err) => {
                logger.debug(&format!("{}: {} failed: {}", peer.server(), probe, err));
                failures.push((*probe, err));
            }
        }
    }
    Err(failures)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted peer shared by discovery and router tests

    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;

    use crate::transport::{effective_method, RpcPeer, TransportError, TransportResult};

    /// Answers each method from a fixed table and records every call
    pub struct ScriptedPeer {
        pub name: String,
        pub answers: HashMap<String, TransportResult<Value>>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedPeer {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                answers: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn answer(mut self, method: &str, result: TransportResult<Value>) -> Self {
            self.answers.insert(method.to_string(), result);
            self
        }

        pub fn methods(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl RpcPeer for ScriptedPeer {
        fn server(&self) -> &str {
            &self.name
        }

        async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
            let method = effective_method(method);
            self.calls.lock().push((method.to_string(), params));
            self.answers.get(method).cloned().unwrap_or_else(|| {
                Err(TransportError::Remote {
                    server: self.name.clone(),
                    code: Some(-32601),
                    message: format!("Method not found: {}", method),
                })
            })
        }
    }
}
