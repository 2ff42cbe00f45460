//! The tool manager
//!
//! One explicit context object owns the supervisor, the registry and the
//! special tools. Construct it once at startup and share it by `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ButlerConfig, ServerConfig};
use crate::discovery::{discover_session, DiscoveryError, DiscoveryReport, DiscoveryResult, ServerDiscovery};
use crate::logging::SharedLogger;
use crate::supervisor::{LifecycleHook, ProviderSession, Supervisor, SupervisorError, SupervisorResult};
use crate::tools::{
    invoke_stdio, local_invocation_name, name_candidates, normalize_result, provider_tool, SpecialTool,
    ToolError, ToolExecutor, ToolRef, ToolRegistry, ToolResult, ToolRoute,
};
use crate::types::{ModelTool, ToolDescriptor, ToolOutput};

/// Purges a provider's registry entries when its process goes away
struct RegistryPurge {
    registry: Arc<ToolRegistry>,
    logger: SharedLogger,
}

impl LifecycleHook for RegistryPurge {
    fn on_exit(&self, server: &str, code: Option<i32>) {
        let purged = self.registry.purge_server(server);
        self.logger.info(&format!(
            "Server '{}' exited with code {:?}; removed {} tools",
            server, code, purged
        ));
    }

    fn on_error(&self, server: &str, error: &str) {
        let purged = self.registry.purge_server(server);
        self.logger.error(&format!(
            "Server '{}' failed: {}; removed {} tools",
            server, error, purged
        ));
    }
}

/// Outcome of starting every configured provider
#[derive(Debug, Default)]
pub struct StartReport {
    pub started: Vec<String>,
    pub failed: Vec<(String, SupervisorError)>,
}

impl StartReport {
    pub fn all_started(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns provider sessions, the tool registry and special tools
pub struct ToolManager {
    supervisor: Supervisor,
    registry: Arc<ToolRegistry>,
    servers: BTreeMap<String, ServerConfig>,
    specials: BTreeMap<String, SpecialTool>,
    logger: SharedLogger,
}

impl ToolManager {
    /// Build a manager; nothing is started yet
    pub fn new(config: &ButlerConfig, logger: SharedLogger) -> Self {
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&logger)));
        let hook = Arc::new(RegistryPurge {
            registry: Arc::clone(&registry),
            logger: Arc::clone(&logger),
        });
        let supervisor = Supervisor::new(config.manager.clone(), hook, Arc::clone(&logger));

        let specials = config
            .special_tools
            .iter()
            .map(|special| (special.name.clone(), SpecialTool::new(special.clone())))
            .collect();

        let manager = Self {
            supervisor,
            registry,
            servers: config.servers.clone(),
            specials,
            logger,
        };
        manager.register_specials();
        manager
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn session(&self, name: &str) -> Option<Arc<ProviderSession>> {
        self.supervisor.get(name)
    }

    fn register_specials(&self) {
        for name in self.specials.keys() {
            self.registry.register_special(name);
        }
    }

    /// Start one configured provider by name
    pub fn start_server(&self, name: &str) -> SupervisorResult<Arc<ProviderSession>> {
        let config = self.servers.get(name).ok_or_else(|| SupervisorError::InvalidConfig {
            server: name.to_string(),
            message: "not configured".to_string(),
        })?;
        self.supervisor.start(name, config)
    }

    /// Start every configured provider; one failure never stops the rest
    pub fn start_all(&self) -> StartReport {
        let mut report = StartReport::default();
        for (name, config) in &self.servers {
            match self.supervisor.start(name, config) {
                Ok(_) => report.started.push(name.clone()),
                Err(err) => {
                    self.logger.error(&format!("Failed to start server '{}': {}", name, err));
                    report.failed.push((name.clone(), err));
                }
            }
        }
        self.logger.info(&format!(
            "Started {} of {} servers",
            report.started.len(),
            self.servers.len()
        ));
        report
    }

    /// Register a session created outside the supervisor
    pub fn attach_session(&self, session: Arc<ProviderSession>) -> SupervisorResult<()> {
        self.supervisor.attach(session)
    }

    /// Discover one provider and replace its registry entries
    pub async fn discover_tools(&self, name: &str) -> DiscoveryResult<ServerDiscovery> {
        let session = self
            .supervisor
            .get(name)
            .ok_or_else(|| DiscoveryError::UnknownServer(name.to_string()))?;

        let discovery = discover_session(&session, self.logger.as_ref()).await;
        self.registry
            .replace_server(name, session.is_stdio(), &discovery.tools);
        Ok(discovery)
    }

    /// Discover every live provider, one at a time
    pub async fn discover_all(&self) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for name in self.supervisor.names() {
            match self.discover_tools(&name).await {
                Ok(discovery) => report.record(&discovery),
                Err(err) => {
                    self.logger.error(&format!("Failed to discover tools from server '{}': {}", name, err));
                    report.per_server.insert(name, 0);
                }
            }
        }
        self.register_specials();

        self.logger.info(&format!("Total tools discovered: {}", report.total()));
        for (server, count) in &report.per_server {
            self.logger.info(&format!("- Server '{}': {} tools", server, count));
        }
        report
    }

    /// Resolve a model-facing name to its route
    ///
    /// On a miss, rediscovers every provider and retries once, then tries
    /// prefix normalization before giving up with the known identifiers.
    pub async fn resolve(&self, name: &str) -> ToolResult<ToolRoute> {
        if let Some(route) = self.registry.lookup(name) {
            return Ok(route);
        }

        self.logger.info(&format!("Tool \"{}\" not registered, rediscovering", name));
        self.discover_all().await;
        if let Some(route) = self.registry.lookup(name) {
            return Ok(route);
        }

        let mut matches: Vec<(String, ToolRoute)> = name_candidates(name, &self.supervisor.names())
            .into_iter()
            .filter_map(|candidate| self.registry.lookup(&candidate).map(|route| (candidate, route)))
            .collect();

        match matches.len() {
            0 => Err(ToolError::NotFound {
                name: name.to_string(),
                known: self.registry.keys(),
            }),
            1 => {
                let (key, route) = matches.remove(0);
                self.logger.info(&format!("Resolved \"{}\" as \"{}\"", name, key));
                Ok(route)
            }
            _ => Err(ToolError::Ambiguous {
                name: name.to_string(),
                candidates: matches.into_iter().map(|(key, _)| key).collect(),
            }),
        }
    }

    /// Resolve and run one tool
    pub async fn execute(&self, name: &str, arguments: Value) -> ToolResult<ToolOutput> {
        match self.resolve(name).await? {
            ToolRoute::Special(special) => {
                let tool = self.specials.get(&special).ok_or_else(|| ToolError::NotFound {
                    name: special.clone(),
                    known: self.registry.keys(),
                })?;
                tool.run(&arguments, self.logger.as_ref()).await
            }
            ToolRoute::Stdio(tool_ref) => self.execute_stdio(&tool_ref, arguments).await,
            ToolRoute::Http(tool_ref) => self.execute_http(&tool_ref, arguments).await,
        }
    }

    async fn execute_stdio(&self, tool_ref: &ToolRef, arguments: Value) -> ToolResult<ToolOutput> {
        let session = self.live_session(tool_ref)?;
        let channel = session.stdio_channel().ok_or_else(|| ToolError::Unsupported {
            server: tool_ref.server.clone(),
            tool: tool_ref.local.clone(),
        })?;

        let known: Vec<String> = session.tools().into_iter().map(|tool| tool.name).collect();
        let local = local_invocation_name(&tool_ref.server, &tool_ref.local, &known);
        let result = invoke_stdio(channel.as_ref(), local, arguments, self.logger.as_ref()).await?;
        Ok(normalize_result(result))
    }

    async fn execute_http(&self, tool_ref: &ToolRef, arguments: Value) -> ToolResult<ToolOutput> {
        let session = self.live_session(tool_ref)?;
        let channel = session.http_channel().ok_or_else(|| ToolError::Unsupported {
            server: tool_ref.server.clone(),
            tool: tool_ref.local.clone(),
        })?;

        self.logger.info(&format!(
            "Executing tool \"{}\" via HTTP on server \"{}\"",
            tool_ref.local, tool_ref.server
        ));
        let result = channel.execute(&tool_ref.local, arguments).await?;
        Ok(normalize_result(result))
    }

    fn live_session(&self, tool_ref: &ToolRef) -> ToolResult<Arc<ProviderSession>> {
        self.supervisor
            .get(&tool_ref.server)
            .ok_or_else(|| ToolError::ServerUnavailable {
                server: tool_ref.server.clone(),
                tool: tool_ref.local.clone(),
            })
    }

    /// Registered provider tools followed by special tools
    pub fn catalog(&self) -> Vec<ModelTool> {
        let mut descriptors: HashMap<String, Vec<ToolDescriptor>> = HashMap::new();
        let mut provider_tools = Vec::new();
        let mut special_tools = Vec::new();

        for (key, route) in self.registry.entries() {
            match route {
                ToolRoute::Stdio(tool_ref) | ToolRoute::Http(tool_ref) => {
                    let tools = descriptors.entry(tool_ref.server.clone()).or_insert_with(|| {
                        self.supervisor
                            .get(&tool_ref.server)
                            .map(|session| session.tools())
                            .unwrap_or_default()
                    });
                    match tools.iter().find(|tool| tool.name == tool_ref.local) {
                        Some(tool) => provider_tools.push(provider_tool(&key, &tool_ref.server, tool)),
                        None => self.logger.warn(&format!("Registered tool '{}' has no descriptor", key)),
                    }
                }
                ToolRoute::Special(name) => {
                    if let Some(special) = self.specials.get(&name) {
                        special_tools.push(special.model_tool());
                    }
                }
            }
        }

        provider_tools.extend(special_tools);
        for tool in &provider_tools {
            self.logger.debug(&format!("Catalog tool: {} ({})", tool.name, tool.description));
        }
        provider_tools
    }

    /// Fail all in-flight requests, kill every process and clear the registry
    ///
    /// Idempotent.
    pub fn stop_all(&self) -> usize {
        let stopped = self.supervisor.stop_all();
        self.registry.clear();
        if stopped > 0 {
            self.logger.info(&format!("Stopped {} servers", stopped));
        }
        stopped
    }
}

impl Drop for ToolManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("sessions", &self.supervisor.names())
            .field("tools", &self.registry.len())
            .field("specials", &self.specials.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ToolExecutor for ToolManager {
    fn catalog(&self) -> Vec<ModelTool> {
        ToolManager::catalog(self)
    }

    async fn execute(&self, name: &str, arguments: Value) -> ToolResult<ToolOutput> {
        ToolManager::execute(self, name, arguments).await
    }
}
