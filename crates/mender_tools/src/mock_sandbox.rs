//! Mock sandbox for tests.
//!
//! Captures every request and returns predefined responses so tool and
//! orchestration tests never need a Docker daemon.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{ToolError, ToolResult};
use crate::sandbox::{SandboxOutput, SandboxRequest, SandboxRunner};

/// Predefined response for one sandbox execution.
#[derive(Debug, Clone)]
pub struct SandboxResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl SandboxResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 100,
        }
    }

    pub fn failure(exit_code: i64, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 100,
        }
    }
}

/// Scripted sandbox runner.
#[derive(Clone, Default)]
pub struct MockSandbox {
    responses: Arc<RwLock<Vec<SandboxResponse>>>,
    response_index: Arc<AtomicUsize>,
    captured_commands: Arc<RwLock<Vec<String>>>,
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next run.
    pub fn add_response(self, response: SandboxResponse) -> Self {
        self.responses.write().push(response);
        self
    }

    /// Fail every run with the given message.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Commands seen so far.
    pub fn captured_commands(&self) -> Vec<String> {
        self.captured_commands.read().clone()
    }

    fn next_response(&self) -> SandboxResponse {
        let responses = self.responses.read();
        if responses.is_empty() {
            return SandboxResponse::success("");
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_else(|| SandboxResponse::success(""))
    }
}

#[async_trait]
impl SandboxRunner for MockSandbox {
    async fn is_available(&self) -> ToolResult<bool> {
        Ok(true)
    }

    async fn run(&self, request: &SandboxRequest) -> ToolResult<SandboxOutput> {
        self.captured_commands.write().push(request.command.clone());

        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(ToolError::ExecutionFailed(msg));
        }

        let response = self.next_response();
        let started_at = Utc::now();
        let finished_at = started_at + chrono::Duration::milliseconds(response.duration_ms as i64);

        Ok(SandboxOutput {
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at,
            finished_at,
            duration_ms: response.duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sandbox_scripted_responses() {
        let sandbox = MockSandbox::new()
            .add_response(SandboxResponse::success("2 passed"))
            .add_response(SandboxResponse::failure(1, "1 failed"));

        let request = SandboxRequest::new("pytest -xvs", "/tmp/proj");
        let first = sandbox.run(&request).await.unwrap();
        assert!(first.success());
        assert_eq!(first.stdout, "2 passed");

        let second = sandbox.run(&request).await.unwrap();
        assert!(!second.success());
        assert_eq!(second.combined_output(), "1 failed");

        assert_eq!(sandbox.captured_commands().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_sandbox_failure() {
        let sandbox = MockSandbox::new().simulate_failure("daemon down");
        let request = SandboxRequest::new("cargo test", "/tmp/proj");
        assert!(sandbox.run(&request).await.is_err());
    }
}
