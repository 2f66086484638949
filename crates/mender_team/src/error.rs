//! Error types for team orchestration.

use thiserror::Error;

/// Result type alias for team operations.
pub type TeamResult<T> = Result<T, TeamError>;

/// Errors raised during assembly or a run.
///
/// Assembly errors are fatal and surface before a run starts; run-time
/// errors are caught at the driver boundary and folded into the
/// `RunResult`.
#[derive(Error, Debug)]
pub enum TeamError {
    #[error("Role {role} declares hand-off to absent role: {target}")]
    UndeclaredHandoff { role: String, target: String },

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Role {role} invoked undeclared tool: {tool}")]
    UndeclaredTool { role: String, tool: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model call failed: {0}")]
    Llm(#[from] mender_llm::LlmError),

    #[error("Tool call failed: {0}")]
    Tool(#[from] mender_tools::ToolError),
}
