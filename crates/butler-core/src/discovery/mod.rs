//! Capability discovery
//!
//! Populates a session's tool set with the most specific strategy that
//! works. Discovery of one provider never fails outright: every dead end
//! degrades to an empty (or configured fallback) tool set.

mod normalize;
mod probe;

#[cfg(test)]
pub(crate) use probe::testing;

use std::collections::BTreeMap;

use thiserror::Error;

pub use normalize::{parse_tool_list, parse_tool_list_or_array, partition_named};
pub use probe::{first_success, ProbeError, StdioProbe};

use crate::logging::Logger;
use crate::supervisor::{Endpoint, ProviderSession};
use crate::transport::{HttpChannel, RpcPeer, TransportError};
use crate::types::ToolDescriptor;

/// Errors from a discovery request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no running server named '{0}'")]
    UnknownServer(String),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Where a session's tool set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    /// Built-in provider; nothing to discover
    Builtin,
    /// A stdio probe answered
    Probe(StdioProbe),
    /// Every probe failed; configured fallback tools were used
    Fallback,
    /// `GET /tools` answered
    Http,
    /// The HTTP provider never became reachable and was killed
    Unreachable,
    /// Discovery failed and the tool set is empty
    Failed,
}

/// Result of discovering one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDiscovery {
    pub server: String,
    pub tools: Vec<ToolDescriptor>,
    pub source: DiscoverySource,
}

/// One tool found during a discovery pass
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredTool {
    pub server: String,
    pub tool: ToolDescriptor,
}

/// Aggregate of a full discovery pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryReport {
    pub tools: Vec<DiscoveredTool>,
    pub per_server: BTreeMap<String, usize>,
}

impl DiscoveryReport {
    pub fn total(&self) -> usize {
        self.tools.len()
    }

    pub fn record(&mut self, discovery: &ServerDiscovery) {
        self.per_server.insert(discovery.server.clone(), discovery.tools.len());
        self.tools.extend(discovery.tools.iter().map(|tool| DiscoveredTool {
            server: discovery.server.clone(),
            tool: tool.clone(),
        }));
    }
}

/// Discover one session's tools and store them on the session
pub async fn discover_session(session: &ProviderSession, logger: &dyn Logger) -> ServerDiscovery {
    let name = session.name();
    let (tools, source) = match session.endpoint() {
        Endpoint::Builtin { .. } => {
            logger.info(&format!("Server '{}' is built-in, skipping tool discovery", name));
            (Vec::new(), DiscoverySource::Builtin)
        }
        Endpoint::Stdio { channel } => {
            logger.info(&format!("Discovering tools for stdio server '{}'", name));
            discover_stdio(channel.as_ref(), &session.config().fallback_tools, logger).await
        }
        Endpoint::Http { channel, .. } => {
            logger.info(&format!("Discovering tools for server '{}' at {}/tools", name, channel.base_url()));
            let (tools, source) = discover_http(channel, logger).await;
            if source == DiscoverySource::Unreachable && session.kill() {
                logger.info(&format!("Killing process for unresponsive server '{}'", name));
            }
            (tools, source)
        }
    };

    let (tools, skipped) = partition_named(tools);
    if skipped > 0 {
        logger.warn(&format!("Skipping {} tool(s) from '{}' with no name", skipped, name));
    }
    session.set_tools(tools.clone());

    ServerDiscovery {
        server: name.to_string(),
        tools,
        source,
    }
}

/// Run the stdio probes, falling back to `fallback` and then to nothing
pub async fn discover_stdio(
    peer: &dyn RpcPeer,
    fallback: &[ToolDescriptor],
    logger: &dyn Logger,
) -> (Vec<ToolDescriptor>, DiscoverySource) {
    match first_success(peer, &StdioProbe::ORDER, logger).await {
        Ok((probe, tools)) => (tools, DiscoverySource::Probe(probe)),
        Err(failures) => {
            let summary = failures
                .iter()
                .map(|(probe, err)| format!("{}: {}", probe, err))
                .collect::<Vec<_>>()
                .join("; ");
            if fallback.is_empty() {
                logger.warn(&format!("No tools discovered for '{}' ({})", peer.server(), summary));
                (Vec::new(), DiscoverySource::Failed)
            } else {
                logger.info(&format!(
                    "Using {} configured fallback tools for '{}' ({})",
                    fallback.len(),
                    peer.server(),
                    summary
                ));
                (fallback.to_vec(), DiscoverySource::Fallback)
            }
        }
    }
}

/// `GET /tools` with retries; malformed payloads count as zero tools
pub async fn discover_http(channel: &HttpChannel, logger: &dyn Logger) -> (Vec<ToolDescriptor>, DiscoverySource) {
    match channel.fetch_tools().await {
        Ok(payload) => match parse_tool_list(&payload) {
            Some(tools) => {
                logger.info(&format!("Discovered {} tools from server '{}'", tools.len(), channel.server()));
                (tools, DiscoverySource::Http)
            }
            None => {
                logger.warn(&format!("Server '{}' returned a malformed tool list", channel.server()));
                (Vec::new(), DiscoverySource::Http)
            }
        },
        Err(TransportError::Unreachable { .. }) => (Vec::new(), DiscoverySource::Unreachable),
        Err(err) => {
            logger.error(&format!("Failed to discover tools from server '{}': {}", channel.server(), err));
            (Vec::new(), DiscoverySource::Failed)
        }
    }
}
