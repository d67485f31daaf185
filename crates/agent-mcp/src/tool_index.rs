use dashmap::DashMap;

use crate::types::{McpTool, ToolAlias};

/// Maps model-facing aliases to the server and tool they stand for.
pub struct ToolIndex {
    entries: DashMap<String, (ToolAlias, McpTool)>,
}

impl ToolIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// `mcp__{server}__{tool}`, with `:` folded to `_` so the result stays a
    /// valid function name.
    pub fn alias_for(server_id: &str, tool_name: &str) -> String {
        let server = server_id.replace("::", "__").replace(':', "_");
        let tool = tool_name.replace("::", "__").replace(':', "_");
        format!("mcp__{}__{}", server, tool)
    }

    /// Index a server's tools after applying its allow/deny lists. Returns
    /// the aliases that were registered.
    pub fn register_server_tools(
        &self,
        server_id: &str,
        tools: &[McpTool],
        allowed_tools: &[String],
        denied_tools: &[String],
    ) -> Vec<ToolAlias> {
        tools
            .iter()
            .filter(|tool| allowed_tools.is_empty() || allowed_tools.contains(&tool.name))
            .filter(|tool| !denied_tools.contains(&tool.name))
            .map(|tool| {
                let alias = ToolAlias {
                    alias: Self::alias_for(server_id, &tool.name),
                    server_id: server_id.to_string(),
                    original_name: tool.name.clone(),
                };
                self.entries
                    .insert(alias.alias.clone(), (alias.clone(), tool.clone()));
                alias
            })
            .collect()
    }

    pub fn remove_server_tools(&self, server_id: &str) {
        self.entries
            .retain(|_, (alias, _)| alias.server_id != server_id);
    }

    pub fn lookup(&self, alias: &str) -> Option<ToolAlias> {
        self.entries.get(alias).map(|entry| entry.0.clone())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Every indexed tool under its alias, sorted by alias.
    pub fn tools(&self) -> Vec<(ToolAlias, McpTool)> {
        let mut tools: Vec<_> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tools.sort_by(|a, b| a.0.alias.cmp(&b.0.alias));
        tools
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolIndex {
    fn default() -> Self {
        Self::new()
    }
}
