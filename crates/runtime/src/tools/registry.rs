//! Name-keyed directory of tools across connected servers.

use std::collections::HashMap;

use serde_json::Value;

use crate::llm::ToolSpec;

/// A tool as advertised by its owning server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Name of the server that owns this tool.
    pub server: String,
}

impl ToolDescriptor {
    pub fn from_tool(server: impl Into<String>, tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
            server: server.into(),
        }
    }

    /// Project to the shape the completion client expects.
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// In-memory index `tool name -> descriptor`.
///
/// A later registration under an existing name replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every tool exposed by `server`.
    pub fn register(&mut self, server: &str, tools: impl IntoIterator<Item = mcp::Tool>) {
        for tool in tools {
            let descriptor = ToolDescriptor::from_tool(server, tool);
            tracing::debug!(server = %server, tool = %descriptor.name, "registered tool");
            if let Some(previous) = self.tools.insert(descriptor.name.clone(), descriptor) {
                tracing::warn!(
                    tool = %previous.name,
                    previous = %previous.server,
                    server = %server,
                    "tool name collision, later server wins"
                );
            }
        }
    }

    /// Remove the tools `server` still owns. Returns how many were removed.
    pub fn remove_server(&mut self, server: &str) -> usize {
        let before = self.tools.len();
        self.tools.retain(|_, d| d.server != server);
        before - self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Name of the server that owns `name`.
    pub fn server_for(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|d| d.server.as_str())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// Descriptors sorted by tool name.
    pub fn descriptors(&self) -> Vec<&ToolDescriptor> {
        let mut all: Vec<_> = self.tools.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Model-facing tool specs, sorted by tool name.
    pub fn model_tool_specs(&self) -> Vec<ToolSpec> {
        self.descriptors().into_iter().map(ToolDescriptor::to_spec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, description: &str) -> mcp::Tool {
        serde_json::from_value(json!({
            "name": name,
            "description": description,
            "inputSchema": {"type": "object"}
        }))
        .unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register("fs", [tool("read_file", "Read"), tool("write_file", "Write")]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.server_for("read_file"), Some("fs"));
        assert_eq!(registry.get("write_file").unwrap().description, "Write");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = ToolRegistry::new();
        registry.register("a", [tool("search", "from a")]);
        registry.register("b", [tool("search", "from b")]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.server_for("search"), Some("b"));

        let specs = registry.model_tool_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].description, "from b");
    }

    #[test]
    fn remove_server_keeps_overwritten_names() {
        let mut registry = ToolRegistry::new();
        registry.register("a", [tool("search", ""), tool("only_a", "")]);
        registry.register("b", [tool("search", "")]);

        assert_eq!(registry.remove_server("a"), 1);
        assert_eq!(registry.server_for("search"), Some("b"));
        assert!(registry.get("only_a").is_none());
    }

    #[test]
    fn specs_are_sorted_and_drop_ownership() {
        let mut registry = ToolRegistry::new();
        registry.register("x", [tool("zeta", "z"), tool("alpha", "a")]);

        let specs = registry.model_tool_specs();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(specs[0].parameters, json!({"type": "object"}));
    }
}
