//! Tool trait for the abstraction over agent capabilities.
//!
//! Tools are resources too: each tool kind is reconciled by its own
//! controller, and an assistant assembles a [`Toolbox`] from its alias map
//! before every chat turn.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::kinds::ToolDescriptions;

/// A callable the agent can use.
#[async_trait]
pub trait Tool: Send + Sync {
    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// The active alias → tool mapping for one chat turn.
#[derive(Clone, Default)]
pub struct Toolbox {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Toolbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under an alias. Replaces any existing entry.
    pub fn insert(&mut self, alias: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.insert(alias.into(), tool);
    }

    pub fn get(&self, alias: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(alias)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Alias → description, as recorded in task logs.
    pub fn descriptions(&self) -> ToolDescriptions {
        self.tools
            .iter()
            .map(|(alias, tool)| (alias.clone(), tool.description().to_string()))
            .collect()
    }

    /// Call a tool by alias.
    pub async fn call(&self, alias: &str, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let tool = self.tools.get(alias).ok_or_else(|| ToolError::NotFound(alias.to_string()))?;
        tool.call(arguments).await
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox").field("tools", &self.names()).finish()
    }
}
