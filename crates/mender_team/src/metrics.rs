//! Process-wide run metrics.
//!
//! Counters are append-only atomics, safe to update from concurrent runs
//! without run-level locking; each run owns a disjoint task id namespace.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

use serde::Serialize;
use tracing::{error, info};

/// Per-role call statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoleStats {
    pub calls: u64,
    pub total_duration_ms: u64,
    pub total_tokens: u64,
}

/// Snapshot of the system counters.
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate: f64,
    pub active_tasks: i64,
    pub total_role_calls: u64,
    pub total_tokens: u64,
    pub roles: HashMap<String, RoleStats>,
}

/// Collects run lifecycle observations.
#[derive(Default)]
pub struct MetricsCollector {
    tasks_started: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_failed: AtomicU64,
    active_tasks: AtomicI64,
    total_tokens: AtomicU64,
    role_stats: RwLock<HashMap<String, RoleStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a task.
    pub fn record_task_start(&self, task_id: &str) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
        info!(task_id, "task_started");
    }

    /// Record task completion.
    pub fn record_task_completion(&self, task_id: &str, success: bool, duration_ms: u64) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
        if success {
            self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }
        info!(task_id, success, duration_ms, "task_completed");
    }

    /// Record a task that aborted with an error.
    pub fn record_task_failure(&self, task_id: &str, error_text: &str) {
        self.record_task_completion(task_id, false, 0);
        error!(task_id, error = error_text, "task_failed");
    }

    /// Record one role call.
    pub fn record_role_call(&self, role: &str, duration_ms: u64, tokens: u64) {
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
        if let Ok(mut stats) = self.role_stats.write() {
            let entry = stats.entry(role.to_string()).or_default();
            entry.calls += 1;
            entry.total_duration_ms += duration_ms;
            entry.total_tokens += tokens;
        }
    }

    /// Snapshot all counters.
    pub fn system_metrics(&self) -> SystemMetrics {
        let succeeded = self.tasks_succeeded.load(Ordering::Relaxed);
        let failed = self.tasks_failed.load(Ordering::Relaxed);
        let finished = succeeded + failed;
        let roles = self
            .role_stats
            .read()
            .map(|stats| stats.clone())
            .unwrap_or_default();

        SystemMetrics {
            total_tasks: self.tasks_started.load(Ordering::Relaxed),
            successful_tasks: succeeded,
            failed_tasks: failed,
            success_rate: if finished > 0 {
                succeeded as f64 / finished as f64
            } else {
                0.0
            },
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            total_role_calls: roles.values().map(|s| s.calls).sum(),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            roles,
        }
    }
}
