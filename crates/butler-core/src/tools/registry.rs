//! Global map from namespaced tool identifiers to their providers
//!
//! The registry is the only structure consulted when the model names a
//! tool. Identifiers are `<server>_<tool>`; since server names may contain
//! `_` themselves, two providers can produce the same identifier. The
//! first registrant keeps it and the later one is skipped with a warning.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::logging::SharedLogger;
use crate::types::ToolDescriptor;

/// Separator between server and local tool name
pub const NAMESPACE_SEPARATOR: &str = "_";

/// Build `<server>_<local>`
pub fn namespaced(server: &str, local: &str) -> String {
    format!("{}{}{}", server, NAMESPACE_SEPARATOR, local)
}

/// Back-reference from an identifier to its provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolRef {
    pub server: String,
    pub local: String,
}

impl ToolRef {
    pub fn new(server: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            local: local.into(),
        }
    }
}

/// How a registered tool is dispatched
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolRoute {
    /// Provider reached over stdio JSON-RPC
    Stdio(ToolRef),
    /// Provider reached over HTTP
    Http(ToolRef),
    /// Statically declared tool backed by an external command
    Special(String),
}

impl ToolRoute {
    /// Owning provider, if any
    pub fn server(&self) -> Option<&str> {
        match self {
            ToolRoute::Stdio(r) | ToolRoute::Http(r) => Some(&r.server),
            ToolRoute::Special(_) => None,
        }
    }
}

/// Tool registry for every provider's tools
pub struct ToolRegistry {
    routes: RwLock<BTreeMap<String, ToolRoute>>,
    logger: SharedLogger,
}

impl ToolRegistry {
    pub fn new(logger: SharedLogger) -> Self {
        Self {
            routes: RwLock::new(BTreeMap::new()),
            logger,
        }
    }

    /// Register one identifier; false if another route already owns it
    pub fn register(&self, key: impl Into<String>, route: ToolRoute) -> bool {
        let key = key.into();
        let mut routes = self.routes.write();
        match routes.get(&key) {
            Some(existing) if *existing != route => {
                self.logger.warn(&format!(
                    "Tool identifier '{}' already registered to {:?}; skipping {:?}",
                    key, existing, route
                ));
                false
            }
            _ => {
                routes.insert(key, route);
                true
            }
        }
    }

    /// Replace every route of `server` with routes for `tools`
    ///
    /// Nameless descriptors are skipped with a warning. Returns the number
    /// of identifiers registered.
    pub fn replace_server(&self, server: &str, stdio: bool, tools: &[ToolDescriptor]) -> usize {
        let mut routes = self.routes.write();
        routes.retain(|_, route| route.server() != Some(server));

        let mut registered = 0;
        for tool in tools {
            if !tool.has_name() {
                self.logger.warn(&format!("Skipping tool from '{}' with no name", server));
                continue;
            }

            let key = namespaced(server, &tool.name);
            let tool_ref = ToolRef::new(server, tool.name.clone());
            let route = if stdio {
                ToolRoute::Stdio(tool_ref)
            } else {
                ToolRoute::Http(tool_ref)
            };

            if let Some(existing) = routes.get(&key) {
                self.logger.warn(&format!(
                    "Tool identifier '{}' from '{}' collides with {:?}; keeping the first",
                    key, server, existing
                ));
                continue;
            }
            self.logger.debug(&format!("Registered tool: {}", key));
            routes.insert(key, route);
            registered += 1;
        }
        registered
    }

    /// Register a special tool under its bare name
    pub fn register_special(&self, name: &str) -> bool {
        self.register(name, ToolRoute::Special(name.to_string()))
    }

    pub fn lookup(&self, key: &str) -> Option<ToolRoute> {
        self.routes.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.routes.read().contains_key(key)
    }

    /// Every registered identifier, sorted
    pub fn keys(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, ToolRoute)> {
        self.routes
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop every route owned by `server`
    pub fn purge_server(&self, server: &str) -> usize {
        let mut routes = self.routes.write();
        let before = routes.len();
        routes.retain(|_, route| route.server() != Some(server));
        before - routes.len()
    }

    pub fn clear(&self) {
        self.routes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("routes", &self.keys()).finish()
    }
}
