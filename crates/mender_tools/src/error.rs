//! Error types for tool execution.

use thiserror::Error;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors raised by tools and the sandbox.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File too large: {size_mb:.2}MB (max: {max_mb}MB)")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),

    #[error("Sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Execution timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
}
