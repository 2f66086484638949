//! Sandbox runner trait and types.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolResult;

/// A command to execute inside the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    /// Shell command line
    pub command: String,
    /// Host directory mounted read-write at the sandbox work dir
    pub host_dir: PathBuf,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Timeout in seconds (0 = sandbox default)
    pub timeout_secs: u64,
}

impl SandboxRequest {
    pub fn new(command: impl Into<String>, host_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            host_dir: host_dir.into(),
            env: HashMap::new(),
            timeout_secs: 0,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }
}

/// Captured result of a sandbox execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl SandboxOutput {
    /// Whether the command exited cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Combined stdout + stderr.
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Isolated command execution.
///
/// The production implementation is Docker; tests use a scripted mock.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Check whether the sandbox backend is reachable.
    async fn is_available(&self) -> ToolResult<bool>;

    /// Run a command to completion and capture its output.
    async fn run(&self, request: &SandboxRequest) -> ToolResult<SandboxOutput>;
}
