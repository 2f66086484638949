//! Run lifecycle events for incremental observation.
//!
//! The streaming driver pushes these over an unbounded channel; the HTTP
//! surface forwards them as server-sent events.

use serde::Serialize;

use mender_core::task::{Message, StopReason};

use crate::roles::RoleKind;

/// One observable step of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TeamEvent {
    TaskCreated {
        task_id: String,
    },
    TurnStarted {
        round: u32,
        role: RoleKind,
    },
    ToolInvoked {
        role: RoleKind,
        tool: String,
    },
    TurnCompleted {
        round: u32,
        role: RoleKind,
        message: Message,
    },
    TaskCompleted {
        task_id: String,
        success: bool,
        stop_reason: StopReason,
    },
    Error {
        task_id: String,
        error: String,
    },
}
