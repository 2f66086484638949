//! The tool contract.

use async_trait::async_trait;

use crate::error::ToolResult;

/// A capability a role can invoke during its turn.
///
/// Inputs and results are typed structs on each implementation; the dyn
/// boundary is JSON so the orchestration core can stay agnostic of tool
/// internals.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name as referenced by role specs.
    fn name(&self) -> &'static str;

    /// One-line description shown to roles.
    fn description(&self) -> &'static str;

    /// Execute the tool against JSON-encoded typed input.
    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value>;
}
