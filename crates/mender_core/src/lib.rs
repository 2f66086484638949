//! Core task model, configuration and marker extraction for BugMender.
//!
//! This crate holds the data structures shared by every other crate:
//! the [`config::Settings`] tree constructed once at process start, the
//! [`task::TaskContext`] accumulator mutated during a run, the transcript
//! [`task::Message`] type, and the substring-marker extraction that turns
//! free-text role output into structured task state.

pub mod config;
pub mod error;
pub mod extract;
pub mod task;

pub use config::Settings;
pub use error::{CoreError, CoreResult};
pub use task::{Message, RunResult, Solution, StopReason, TaskContext};
