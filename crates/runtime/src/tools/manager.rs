//! Tool server manager.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use mcp::{ServerConfig, Tool, Transport};
use tokio::sync::RwLock;

use super::connector::{Connector, ProcessConnector};
use super::host::ToolHost;
use super::registry::{ToolDescriptor, ToolRegistry};
use crate::llm::{ToolCall, ToolSpec};

/// A live transport plus the tool names it exposed at connect time.
struct Connection {
    transport: Transport,
    tools: Vec<String>,
}

#[derive(Default)]
struct State {
    initialized: bool,
    connections: HashMap<String, Arc<Connection>>,
    registry: ToolRegistry,
}

/// Owns the configured tool servers and routes tool calls to them.
///
/// Servers are connected by [`ToolServerManager::initialize`]. A server that
/// fails to connect or list its tools is skipped; it is never retried.
pub struct ToolServerManager<C = ProcessConnector> {
    configs: Vec<ServerConfig>,
    connector: C,
    state: RwLock<State>,
}

impl ToolServerManager {
    /// Create a manager that spawns and dials servers for real.
    pub fn new(configs: Vec<ServerConfig>) -> Self {
        Self::with_connector(configs, ProcessConnector::new())
    }
}

impl<C: Connector> ToolServerManager<C> {
    pub fn with_connector(configs: Vec<ServerConfig>, connector: C) -> Self {
        Self {
            configs,
            connector,
            state: RwLock::new(State::default()),
        }
    }

    pub fn configs(&self) -> &[ServerConfig] {
        &self.configs
    }

    /// Connect every enabled server and build the tool registry.
    ///
    /// Servers are dialed concurrently; tools are registered in
    /// configuration order. Calling this again is a no-op until
    /// [`ToolServerManager::shutdown`].
    pub async fn initialize(&self) {
        let mut state = self.state.write().await;
        if state.initialized {
            return;
        }

        let mut seen = HashSet::new();
        let targets: Vec<&ServerConfig> = self
            .configs
            .iter()
            .filter(|config| {
                if !config.enabled {
                    tracing::debug!(server = %config.name, "server disabled");
                    return false;
                }
                if !seen.insert(config.name.as_str()) {
                    tracing::warn!(server = %config.name, "duplicate server name, ignoring");
                    return false;
                }
                true
            })
            .collect();

        let results = join_all(targets.iter().map(|config| self.open(config))).await;

        for (config, result) in targets.into_iter().zip(results) {
            match result {
                Ok((transport, tools)) => {
                    tracing::info!(server = %config.name, tools = tools.len(), "connected");
                    let names = tools.iter().map(|t| t.name.clone()).collect();
                    state.registry.register(&config.name, tools);
                    state.connections.insert(
                        config.name.clone(),
                        Arc::new(Connection {
                            transport,
                            tools: names,
                        }),
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        server = %config.name,
                        kind = ?e.kind(),
                        error = %e,
                        "skipping server"
                    );
                }
            }
        }

        state.initialized = true;
        tracing::info!(
            servers = state.connections.len(),
            tools = state.registry.len(),
            "tool servers initialized"
        );
    }

    async fn open(&self, config: &ServerConfig) -> mcp::Result<(Transport, Vec<Tool>)> {
        tracing::info!(server = %config.name, transport = %config.transport, "connecting");
        let transport = self.connector.connect(config).await?;
        match transport.list_tools().await {
            Ok(tools) => Ok((transport, tools)),
            Err(e) => {
                transport.close().await;
                Err(e)
            }
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Model-facing specs for every registered tool. Empty before
    /// initialization.
    pub async fn available_tools(&self) -> Vec<ToolSpec> {
        self.state.read().await.registry.model_tool_specs()
    }

    /// Registered tools with their owning server, sorted by name.
    pub async fn registered_tools(&self) -> Vec<ToolDescriptor> {
        let state = self.state.read().await;
        state.registry.descriptors().into_iter().cloned().collect()
    }

    /// Run a tool on its owning server.
    ///
    /// Never fails: unknown tools, missing servers and tool errors come back
    /// as error text for the model to read.
    pub async fn execute_tool(&self, name: &str, arguments: &str) -> String {
        let connection = {
            let state = self.state.read().await;
            let Some(server) = state.registry.server_for(name) else {
                return format!("Error: Tool '{name}' not found in any connected MCP server.");
            };
            match state.connections.get(server) {
                Some(connection) => Arc::clone(connection),
                None => return format!("Error: MCP server '{server}' not connected."),
            }
        };

        match connection.transport.call_tool(name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    server = %connection.transport.name(),
                    tool = %name,
                    error = %e,
                    "tool call failed"
                );
                format!("Error executing tool '{name}': {e}")
            }
        }
    }

    /// Names of connected servers, in configuration order.
    pub async fn connected_servers(&self) -> Vec<String> {
        let state = self.state.read().await;
        self.configs
            .iter()
            .filter(|config| state.connections.contains_key(&config.name))
            .map(|config| config.name.clone())
            .collect()
    }

    /// Close one server and drop the tools it still owns.
    ///
    /// Returns `false` if no such server is connected.
    pub async fn disconnect(&self, name: &str) -> bool {
        let connection = {
            let mut state = self.state.write().await;
            let Some(connection) = state.connections.remove(name) else {
                return false;
            };
            let removed = state.registry.remove_server(name);
            tracing::info!(
                server = %name,
                exposed = connection.tools.len(),
                removed,
                "disconnecting"
            );
            connection
        };

        connection.transport.close().await;
        true
    }

    /// Close every connection and clear the registry.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let connections: Vec<_> = state.connections.drain().map(|(_, c)| c).collect();

        join_all(connections.iter().map(|c| c.transport.close())).await;

        state.registry.clear();
        let was_initialized = std::mem::replace(&mut state.initialized, false);
        if was_initialized {
            tracing::info!(servers = connections.len(), "tool servers shut down");
        }
    }
}

impl<C: Connector> ToolHost for ToolServerManager<C> {
    async fn specs(&self) -> Vec<ToolSpec> {
        self.available_tools().await
    }

    async fn execute(&self, call: &ToolCall) -> String {
        self.execute_tool(&call.name, &call.arguments).await
    }
}
