//! Registry of available tools.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ToolError, ToolResult};
use crate::tool::Tool;

/// Name-indexed tool registry shared across roles.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tool names, sorted for stable prompts.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a tool name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool by name.
    pub async fn run(&self, name: &str, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.run(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the input back"
        }

        async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
            Ok(args)
        }
    }

    #[tokio::test]
    async fn test_registry_lookup_and_run() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        assert!(registry.contains("echo"));
        assert_eq!(registry.names(), vec!["echo"]);

        let result = registry
            .run("echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result["x"], 1);

        let missing = registry.run("nope", serde_json::Value::Null).await;
        assert!(matches!(missing, Err(ToolError::UnknownTool(_))));
    }
}
