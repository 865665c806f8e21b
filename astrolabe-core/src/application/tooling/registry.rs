use super::error::RegistryError;
use super::render::render_result;
use crate::application::connection::{ConnectionState, ServerConnection};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a tool name offered by more than one server is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// The server registered later takes the name.
    #[default]
    LastWins,
    /// The first server keeps the name.
    FirstWins,
    /// Building the registry fails.
    Reject,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "last-wins" | "last" => Ok(CollisionPolicy::LastWins),
            "first-wins" | "first" => Ok(CollisionPolicy::FirstWins),
            "reject" => Ok(CollisionPolicy::Reject),
            other => Err(format!(
                "unknown collision policy '{other}' (expected last-wins, first-wins or reject)"
            )),
        }
    }
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollisionPolicy::LastWins => "last-wins",
            CollisionPolicy::FirstWins => "first-wins",
            CollisionPolicy::Reject => "reject",
        })
    }
}

/// Tool name to owning connection, built once per chat start.
#[derive(Default)]
pub struct ToolRegistry {
    routes: HashMap<String, Arc<ServerConnection>>,
    summaries: Vec<(String, String)>,
}

impl ToolRegistry {
    /// List the tools of every `Ready` connection, in connection order.
    pub async fn build(
        connections: &[Arc<ServerConnection>],
        policy: CollisionPolicy,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for connection in connections {
            if connection.state().await != ConnectionState::Ready {
                continue;
            }
            let tools = connection
                .list_tools()
                .await
                .map_err(|source| RegistryError::Listing {
                    server: connection.name().to_string(),
                    source,
                })?;

            for tool in tools {
                if let Some(owner) = registry.routes.get(&tool.name) {
                    let first = owner.name().to_string();
                    match policy {
                        CollisionPolicy::Reject => {
                            return Err(RegistryError::Collision {
                                tool: tool.name,
                                first,
                                second: connection.name().to_string(),
                            });
                        }
                        CollisionPolicy::FirstWins => {
                            warn!(
                                tool = %tool.name,
                                kept = %first,
                                ignored = connection.name(),
                                "Duplicate tool name, keeping first server"
                            );
                            continue;
                        }
                        CollisionPolicy::LastWins => {
                            warn!(
                                tool = %tool.name,
                                replaced = %first,
                                kept = connection.name(),
                                "Duplicate tool name, later server takes it"
                            );
                            registry.summaries.retain(|(name, _)| name != &tool.name);
                        }
                    }
                }
                registry
                    .summaries
                    .push((tool.name.clone(), tool.format_for_llm()));
                registry.routes.insert(tool.name, Arc::clone(connection));
            }
        }
        info!(tools = registry.routes.len(), "Tool registry built");
        Ok(registry)
    }

    pub fn lookup(&self, tool: &str) -> Option<&Arc<ServerConnection>> {
        self.routes.get(tool)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered tool names in listing order
    pub fn tool_names(&self) -> Vec<&str> {
        self.summaries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Formatted tool summaries, one block per tool, for the system prompt
    pub fn describe(&self) -> String {
        self.summaries
            .iter()
            .map(|(_, summary)| summary.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a tool call and produce the text folded into the conversation.
    pub async fn dispatch(&self, tool: &str, arguments: Value) -> String {
        let Some(connection) = self.lookup(tool) else {
            error!(tool, "No server found with tool");
            return format!("Nenhum servidor encontrado com a ferramenta: {tool}");
        };
        match connection.execute_tool(tool, arguments).await {
            Ok(result) => {
                let rendered = render_result(&result);
                info!(tool, server = connection.name(), result = %rendered, "Tool execution succeeded");
                format!("Resultado da execução da ferramenta: {rendered}")
            }
            Err(err) => {
                error!(tool, server = connection.name(), %err, "Tool execution failed");
                format!("Erro ao executar a ferramenta '{tool}': {err}")
            }
        }
    }
}
