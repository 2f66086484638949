//! Sandboxed test execution.
//!
//! Detects the project's test command from its layout, runs it inside the
//! sandbox, and parses the runner summary into structured counts where the
//! format is recognized (pytest, jest, cargo).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ToolError, ToolResult};
use crate::sandbox::{SandboxRequest, SandboxRunner};
use crate::tool::Tool;

fn default_working_directory() -> String {
    ".".to_string()
}

/// Input for the test run tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTestsInput {
    /// Project directory mounted into the sandbox
    #[serde(default = "default_working_directory")]
    pub working_directory: String,
    /// Explicit test command; detected from the project layout when absent
    #[serde(default)]
    pub test_command: Option<String>,
    /// Specific test files appended to the command
    #[serde(default)]
    pub test_files: Vec<String>,
    /// Timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Result of a test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTestsResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_run: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests_failed: Option<u32>,
    pub duration_ms: u64,
}

/// Run the project's tests inside the sandbox.
pub struct RunTestsTool {
    runner: Arc<dyn SandboxRunner>,
}

impl RunTestsTool {
    pub fn new(runner: Arc<dyn SandboxRunner>) -> Self {
        Self { runner }
    }

    /// Detect the test command from the project layout.
    pub fn detect_test_command(dir: &Path) -> String {
        if dir.join("pytest.ini").exists() || dir.join("pyproject.toml").exists() {
            "pytest -xvs".to_string()
        } else if dir.join("setup.py").exists() {
            "python -m pytest".to_string()
        } else if dir.join("manage.py").exists() {
            "python manage.py test".to_string()
        } else if dir.join("package.json").exists() {
            "npm test".to_string()
        } else if dir.join("go.mod").exists() {
            "go test ./...".to_string()
        } else if dir.join("Cargo.toml").exists() {
            "cargo test".to_string()
        } else {
            "python -m pytest".to_string()
        }
    }

    /// Parse a runner summary into (run, passed, failed) counts.
    pub fn parse_summary(command: &str, output: &str) -> (Option<u32>, Option<u32>, Option<u32>) {
        if command.contains("pytest") {
            let re = regex::Regex::new(r"(\d+) passed(?:, (\d+) failed)?(?:, (\d+) error)?");
            if let Some(caps) = re.ok().and_then(|re| re.captures(output)) {
                let passed: u32 = caps[1].parse().unwrap_or(0);
                let failed = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0))
                    + caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));
                return (Some(passed + failed), Some(passed), Some(failed));
            }
        } else if command.contains("npm") || command.contains("jest") {
            let re = regex::Regex::new(r"Tests:\s+(\d+) passed(?:, (\d+) failed)?(?:, (\d+) total)?");
            if let Some(caps) = re.ok().and_then(|re| re.captures(output)) {
                let passed: u32 = caps[1].parse().unwrap_or(0);
                let failed = caps.get(2).map_or(0, |m| m.as_str().parse().unwrap_or(0));
                let total = caps
                    .get(3)
                    .map_or(passed + failed, |m| m.as_str().parse().unwrap_or(0));
                return (Some(total), Some(passed), Some(failed));
            }
        } else if command.contains("cargo test") {
            let re = regex::Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed");
            if let Some(caps) = re.ok().and_then(|re| re.captures(output)) {
                let passed: u32 = caps[1].parse().unwrap_or(0);
                let failed: u32 = caps[2].parse().unwrap_or(0);
                return (Some(passed + failed), Some(passed), Some(failed));
            }
        }
        (None, None, None)
    }

    async fn run_tests(&self, input: &RunTestsInput) -> ToolResult<RunTestsResult> {
        let dir = Path::new(&input.working_directory);

        let mut command = input
            .test_command
            .clone()
            .unwrap_or_else(|| Self::detect_test_command(dir));
        if !input.test_files.is_empty() {
            command.push(' ');
            command.push_str(&input.test_files.join(" "));
        }

        info!(command = %command, dir = %input.working_directory, "Running tests in sandbox");

        let mut request = SandboxRequest::new(&command, dir);
        if let Some(timeout) = input.timeout_secs {
            request = request.timeout(timeout);
        }

        let output = self.runner.run(&request).await?;
        let combined = output.combined_output();
        let (tests_run, tests_passed, tests_failed) = Self::parse_summary(&command, &combined);

        Ok(RunTestsResult {
            success: output.success(),
            output: combined,
            exit_code: output.exit_code,
            tests_run,
            tests_passed,
            tests_failed,
            duration_ms: output.duration_ms,
        })
    }
}

#[async_trait]
impl Tool for RunTestsTool {
    fn name(&self) -> &'static str {
        "run_tests"
    }

    fn description(&self) -> &'static str {
        "Run the project's tests in an isolated sandbox"
    }

    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let input: RunTestsInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let result = self.run_tests(&input).await?;
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_sandbox::{MockSandbox, SandboxResponse};

    #[test]
    fn test_command_detection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(RunTestsTool::detect_test_command(dir.path()), "cargo test");

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "[project]").unwrap();
        assert_eq!(RunTestsTool::detect_test_command(dir.path()), "pytest -xvs");

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        assert_eq!(
            RunTestsTool::detect_test_command(dir.path()),
            "go test ./..."
        );

        // Unknown layouts fall back to pytest.
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            RunTestsTool::detect_test_command(dir.path()),
            "python -m pytest"
        );
    }

    #[test]
    fn test_pytest_summary_parsing() {
        let (run, passed, failed) =
            RunTestsTool::parse_summary("pytest -xvs", "==== 3 passed, 1 failed in 0.5s ====");
        assert_eq!(run, Some(4));
        assert_eq!(passed, Some(3));
        assert_eq!(failed, Some(1));
    }

    #[test]
    fn test_jest_summary_parsing() {
        let (run, passed, failed) =
            RunTestsTool::parse_summary("npm test", "Tests:  5 passed, 5 total");
        assert_eq!(run, Some(5));
        assert_eq!(passed, Some(5));
        assert_eq!(failed, Some(0));
    }

    #[test]
    fn test_cargo_summary_parsing() {
        let (run, passed, failed) = RunTestsTool::parse_summary(
            "cargo test",
            "test result: ok. 12 passed; 0 failed; 0 ignored",
        );
        assert_eq!(run, Some(12));
        assert_eq!(passed, Some(12));
        assert_eq!(failed, Some(0));
    }

    #[tokio::test]
    async fn test_run_through_mock_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pytest.ini"), "[pytest]").unwrap();

        let sandbox = MockSandbox::new()
            .add_response(SandboxResponse::success("==== 2 passed in 0.1s ===="));
        let tool = RunTestsTool::new(Arc::new(sandbox.clone()));

        let result = tool
            .run(serde_json::json!({
                "working_directory": dir.path().display().to_string()
            }))
            .await
            .unwrap();
        let result: RunTestsResult = serde_json::from_value(result).unwrap();

        assert!(result.success);
        assert_eq!(result.tests_passed, Some(2));
        assert_eq!(sandbox.captured_commands(), vec!["pytest -xvs"]);
    }

    #[tokio::test]
    async fn test_explicit_command_and_files() {
        let sandbox = MockSandbox::new().add_response(SandboxResponse::success(""));
        let tool = RunTestsTool::new(Arc::new(sandbox.clone()));

        tool.run(serde_json::json!({
            "working_directory": ".",
            "test_command": "pytest",
            "test_files": ["tests/test_auth.py"]
        }))
        .await
        .unwrap();

        assert_eq!(
            sandbox.captured_commands(),
            vec!["pytest tests/test_auth.py"]
        );
    }
}
