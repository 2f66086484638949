//! Task state shared across one debugging run.
//!
//! The [`TaskContext`] is a passive record: it is mutated exclusively by the
//! run driver during extraction and never enforces its own invariants. The
//! round bound lives in the termination evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A single transcript entry produced by a role or the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (UUID)
    pub id: String,
    /// Name of the role that produced the message, or "user"
    pub source: String,
    /// Message content
    pub content: String,
    /// When the message was created
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message attributed to the caller.
    pub fn user(content: impl Into<String>) -> Self {
        Self::from_source("user", content)
    }

    /// Create a message attributed to a role.
    pub fn from_source(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// A proposed patch captured from a role message.
///
/// Low-fidelity by design: the raw message content associated with a
/// timestamp, appended in encounter order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRecord {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// The most recent test outcome reported by a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Mutable record of one debugging attempt's accumulated state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// Opaque unique identifier, immutable after creation
    pub task_id: String,
    /// Original bug report text, immutable after creation
    pub bug_report: String,
    /// Ordered plan steps; overwritten by later planning messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    /// File paths of interest
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub located_files: Vec<String>,
    /// Proposed patches, append-only during a run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proposed_patches: Vec<PatchRecord>,
    /// Most recent test outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestReport>,
    /// Most recent critique
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    /// Rounds observed so far
    pub iteration: u32,
    /// Upper bound on rounds, fixed at creation
    pub max_iterations: u32,
}

impl TaskContext {
    /// Create a fresh context for a bug report.
    pub fn new(bug_report: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            bug_report: bug_report.into(),
            plan: None,
            located_files: Vec::new(),
            proposed_patches: Vec::new(),
            test_results: None,
            critique: None,
            iteration: 0,
            max_iterations,
        }
    }

    /// Pre-populate known fields from a caller-supplied JSON blob.
    ///
    /// Only `plan` and `located_files` may be seeded; `task_id`,
    /// `bug_report` and the counters stay under the run's control.
    pub fn seed_from_json(&mut self, blob: &serde_json::Value) -> CoreResult<()> {
        let map = blob
            .as_object()
            .ok_or_else(|| CoreError::InvalidContext("expected a JSON object".to_string()))?;

        if let Some(plan) = map.get("plan") {
            let steps: Vec<String> = serde_json::from_value(plan.clone())
                .map_err(|e| CoreError::InvalidContext(format!("plan: {}", e)))?;
            self.plan = Some(steps);
        }
        if let Some(files) = map.get("located_files") {
            let files: Vec<String> = serde_json::from_value(files.clone())
                .map_err(|e| CoreError::InvalidContext(format!("located_files: {}", e)))?;
            self.located_files = files;
        }
        Ok(())
    }
}

/// The extracted solution of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Fixed description label
    pub description: String,
    /// Relevant message contents, in transcript order
    pub patches: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Why a run stopped.
///
/// Each terminal condition gets its own variant so callers can tell an
/// inconclusive stop from a genuine success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `TASK_COMPLETE` observed — success
    Completed,
    /// `TASK_FAILED` observed — failure
    Failed,
    /// Round limit reached — inconclusive
    MaxRounds,
    /// Hand-off to the human sentinel — inconclusive
    HumanEscalation,
    /// Caller cancelled the run — inconclusive
    Cancelled,
}

impl StopReason {
    /// Whether this reason means the task was solved.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether this reason is neither success nor failure.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::MaxRounds | Self::HumanEscalation | Self::Cancelled)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::MaxRounds => "max_rounds",
            Self::HumanEscalation => "human_escalation",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Final output of a run, serializable for CLI and HTTP surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub success: bool,
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<Solution>,
    pub transcript: Vec<Message>,
    /// Snapshot of the task context at the end of the run
    pub context: TaskContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl RunResult {
    /// Build a failure result for a run that aborted with an error.
    pub fn from_error(context: TaskContext, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: context.task_id.clone(),
            success: false,
            stop_reason: None,
            solution: None,
            transcript: Vec::new(),
            context,
            error: Some(error.into()),
            duration_ms,
        }
    }
}
