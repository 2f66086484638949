//! LLM provider adapters for BugMender.
//!
//! Chat completions against OpenAI and Anthropic APIs behind the
//! [`ChatClient`] trait, an [`Embedder`] for the memory subsystem, and
//! scripted mocks for orchestration tests. Retries for transient provider
//! errors live here; the run driver never retries.

pub mod client;
pub mod embedding;
pub mod error;
pub mod mock;

pub use client::{ChatClient, ChatTurn, LlmClient, LlmProvider, LlmResponse, TurnRole};
pub use embedding::{Embedder, OpenAiEmbedder};
pub use error::{LlmError, LlmResult};
pub use mock::{MockChatClient, MockEmbedder};
