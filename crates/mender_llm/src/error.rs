//! Error types for LLM operations.

use thiserror::Error;

/// Result type alias for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors raised by provider adapters.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Unknown model provider: {0}")]
    UnknownProvider(String),

    #[error("API key not configured for provider: {0}")]
    MissingApiKey(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}
