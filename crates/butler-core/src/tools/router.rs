//! Name normalization and per-transport invocation

use serde_json::{json, Value};

use super::registry::namespaced;
use crate::logging::Logger;
use crate::transport::{RpcPeer, TransportError, TransportResult};
use crate::types::ToolOutput;

/// Standard invocation envelope method
pub const CALL_METHOD: &str = "tools/call";

/// Alternative identifiers to try after a registry miss
///
/// Models sometimes double the provider prefix (`mem_mem_read_graph`) or
/// leave it off (`read_graph`). For each running server this yields the
/// de-duplicated form and the prefixed form, never the requested name
/// itself.
pub fn name_candidates(requested: &str, servers: &[String]) -> Vec<String> {
    let mut candidates = Vec::new();
    for server in servers {
        let prefix = namespaced(server, "");
        let doubled = format!("{}{}", prefix, prefix);

        let candidate = if let Some(rest) = requested.strip_prefix(&doubled) {
            namespaced(server, rest)
        } else if requested.starts_with(&prefix) {
            continue;
        } else {
            namespaced(server, requested)
        };

        if candidate != requested && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

/// Local name to send to a provider
///
/// Strips a provider prefix the name already carries, unless the provider
/// really exposes a tool with the prefixed name.
pub fn local_invocation_name<'a>(server: &str, local: &'a str, known: &[String]) -> &'a str {
    if known.iter().any(|name| name == local) {
        return local;
    }
    local.strip_prefix(&namespaced(server, "")).unwrap_or(local)
}

/// Wrap a provider result into `{content}`
///
/// Strings pass through, null becomes empty text, anything else is
/// serialized as JSON.
pub fn normalize_result(value: Value) -> ToolOutput {
    match value {
        Value::String(text) => ToolOutput::new(text),
        Value::Null => ToolOutput::new(String::new()),
        other => ToolOutput::new(other.to_string()),
    }
}

/// Call a tool on a stdio provider
///
/// Sends `tools/call {name, arguments}` first. Only if the provider rejects
/// that envelope is the tool name tried directly as the method. Transport
/// failures such as timeouts or process exit are returned as-is.
pub async fn invoke_stdio(
    peer: &dyn RpcPeer,
    local: &str,
    arguments: Value,
    logger: &dyn Logger,
) -> TransportResult<Value> {
    logger.info(&format!("Executing stdio tool \"{}\" on server \"{}\"", local, peer.server()));

    let envelope = json!({ "name": local, "arguments": arguments.clone() });
    match peer.request(CALL_METHOD, envelope).await {
        Ok(result) => Ok(result),
        Err(err @ TransportError::Remote { .. }) => {
            logger.debug(&format!(
                "{} rejected {} ({}); calling \"{}\" directly",
                peer.server(),
                CALL_METHOD,
                err,
                local
            ));
            peer.request(local, arguments).await
        }
        Err(err) => {
            logger.error(&format!(
                "Failed to execute stdio tool \"{}\" on server \"{}\": {}",
                local,
                peer.server(),
                err
            ));
            Err(err)
        }
    }
}
