//! Immutable tool registry, resolved once when the session is created.
//! No runtime registration; the tool set for a session never changes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::ToolDefinition;
use crate::tools::ToolHandler;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Build the registry from a fixed set of handlers. Duplicate names
    /// keep the first handler and log the collision.
    pub fn new(handlers: Vec<Arc<dyn ToolHandler>>) -> Self {
        let mut tools: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for handler in handlers {
            let name = handler.name().to_string();
            if tools.contains_key(&name) {
                warn!(tool = %name, "Duplicate tool registration skipped");
                continue;
            }
            debug!(tool = %name, "Tool registered");
            tools.insert(name, handler);
        }
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Definitions for the in-process tools, for the reasoner's tool list.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolContext, ToolResult};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Stub(&'static str);

    #[async_trait]
    impl ToolHandler for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::ok("stub")
        }
    }

    #[test]
    fn duplicate_names_keep_first_handler() {
        let registry = ToolRegistry::new(vec![Arc::new(Stub("a")), Arc::new(Stub("a"))]);
        assert_eq!(registry.list().len(), 1);
        assert!(registry.has("a"));
    }

    #[test]
    fn definitions_match_registered_tools() {
        let registry = ToolRegistry::new(vec![Arc::new(Stub("a")), Arc::new(Stub("b"))]);
        assert_eq!(registry.definitions().len(), 2);
    }
}
