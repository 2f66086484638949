//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mender_core::task::RunResult;

fn default_stream() -> bool {
    true
}

/// Bug report submission.
#[derive(Debug, Clone, Deserialize)]
pub struct BugReportRequest {
    /// The bug report or error description
    pub bug_report: String,
    /// Additional context seeded into the task
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    /// Whether the run uses streaming extraction
    #[serde(default = "default_stream")]
    pub stream: bool,
}

/// Response to task creation.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle states of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A registered task and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub task_id: String,
    pub status: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskEntry {
    pub fn pending(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskState::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
