//! Memory search exposed as a role tool.
//!
//! The locator consults past solutions the same way it consults the source
//! tree; tool failures surface as empty result sets, matching the bridge's
//! degradation contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mender_tools::{Tool, ToolError, ToolResult};

use crate::bridge::{MemoryBridge, SimilarCase};

fn default_max_results() -> usize {
    5
}

/// Input for the memory search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchInput {
    /// Search query
    pub query: String,
    /// Maximum number of results
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// Result of a memory search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub results: Vec<SimilarCase>,
    pub total_results: usize,
}

/// Search past debugging solutions.
pub struct SearchMemoryTool {
    bridge: Arc<MemoryBridge>,
}

impl SearchMemoryTool {
    pub fn new(bridge: Arc<MemoryBridge>) -> Self {
        Self { bridge }
    }
}

#[async_trait]
impl Tool for SearchMemoryTool {
    fn name(&self) -> &'static str {
        "search_memory"
    }

    fn description(&self) -> &'static str {
        "Search for similar past solutions and debugging experiences"
    }

    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let input: MemorySearchInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        let mut results = self
            .bridge
            .search_similar(&input.query)
            .await
            .unwrap_or_default();
        results.truncate(input.max_results);

        let result = MemorySearchResult {
            total_results: results.len(),
            results,
        };
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use mender_core::config::MemoryConfig;
    use mender_core::task::{Solution, TaskContext};
    use mender_llm::MockEmbedder;

    #[tokio::test]
    async fn test_tool_returns_stored_cases() {
        let mut config = MemoryConfig::default();
        config.similarity_threshold = 0.1;
        let bridge = Arc::new(MemoryBridge::new(
            Arc::new(MockEmbedder::new()),
            Arc::new(InMemoryStore::new()),
            config,
        ));

        let context = TaskContext::new("index out of bounds in tokenizer", 5);
        let solution = Solution {
            description: "Combined solution from agent team".to_string(),
            patches: vec!["PATCH: bounds check".to_string()],
            timestamp: chrono::Utc::now(),
        };
        bridge
            .store_solution(&context.bug_report.clone(), &solution, &context)
            .await;

        let tool = SearchMemoryTool::new(bridge);
        let value = tool
            .run(serde_json::json!({"query": "index out of bounds in tokenizer"}))
            .await
            .unwrap();
        let result: MemorySearchResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.total_results, 1);
    }

    #[tokio::test]
    async fn test_tool_degrades_to_empty() {
        let bridge = Arc::new(MemoryBridge::new(
            Arc::new(MockEmbedder::failing()),
            Arc::new(InMemoryStore::new()),
            MemoryConfig::default(),
        ));

        let tool = SearchMemoryTool::new(bridge);
        let value = tool
            .run(serde_json::json!({"query": "anything"}))
            .await
            .unwrap();
        let result: MemorySearchResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.total_results, 0);
    }
}
