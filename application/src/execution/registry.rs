//! Tool lookup table

use crate::ports::tool_backend::ToolBackend;
use orchestra_domain::tool::ToolDefinition;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registered tool back-ends keyed by tool id
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolBackend>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one with the same id
    pub fn register(&mut self, backend: Arc<dyn ToolBackend>) {
        self.tools.insert(backend.tool_id().to_string(), backend);
    }

    pub fn with_tool(mut self, backend: Arc<dyn ToolBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, tool_id: &str) -> Option<&Arc<dyn ToolBackend>> {
        self.tools.get(tool_id)
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
