//! Embedding-backed solution memory for BugMender.
//!
//! The [`MemoryBridge`] retrieves similar past cases before a run and
//! persists a solution record after a successful one. Memory is an
//! optimization, never a correctness dependency: every failure in this
//! crate is logged and degraded to "no results" / "not stored".

pub mod bridge;
pub mod error;
pub mod memory_tool;
pub mod store;

pub use bridge::{MemoryBridge, MemoryStats, SimilarCase};
pub use error::{MemoryError, MemoryResult};
pub use memory_tool::SearchMemoryTool;
pub use store::{InMemoryStore, JsonlStore, MemoryRecord, RecordStore};
