//! File reading with size limits and line ranges.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, ToolResult};
use crate::tool::Tool;

/// Input for the file read tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReadInput {
    /// Path to the file to read
    pub file_path: String,
    /// Start line (1-indexed, inclusive)
    #[serde(default)]
    pub start_line: Option<usize>,
    /// End line (1-indexed, inclusive)
    #[serde(default)]
    pub end_line: Option<usize>,
}

/// Result of a file read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReadResult {
    pub content: String,
    pub file_path: String,
    pub total_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Read file contents with an optional line range.
pub struct FileReadTool {
    max_file_size_mb: u64,
}

impl FileReadTool {
    pub fn new(max_file_size_mb: u64) -> Self {
        Self { max_file_size_mb }
    }

    fn detect_language(path: &Path) -> Option<String> {
        let language = match path.extension()?.to_str()? {
            "py" => "python",
            "js" => "javascript",
            "ts" => "typescript",
            "java" => "java",
            "cpp" | "cc" => "cpp",
            "c" | "h" => "c",
            "go" => "go",
            "rs" => "rust",
            "rb" => "ruby",
            "php" => "php",
            _ => return None,
        };
        Some(language.to_string())
    }

    fn read(&self, input: &FileReadInput) -> ToolResult<FileReadResult> {
        let path = Path::new(&input.file_path);
        if !path.is_file() {
            return Err(ToolError::FileNotFound(input.file_path.clone()));
        }

        let size_mb = path.metadata()?.len() as f64 / (1024.0 * 1024.0);
        if size_mb > self.max_file_size_mb as f64 {
            return Err(ToolError::FileTooLarge {
                size_mb,
                max_mb: self.max_file_size_mb,
            });
        }

        let content = std::fs::read_to_string(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let content = if input.start_line.is_some() || input.end_line.is_some() {
            let start = input.start_line.unwrap_or(1).saturating_sub(1);
            let end = input.end_line.unwrap_or(total_lines).min(total_lines);
            if start >= end {
                String::new()
            } else {
                lines[start..end].join("\n")
            }
        } else {
            content
        };

        Ok(FileReadResult {
            content,
            file_path: path.display().to_string(),
            total_lines,
            language: Self::detect_language(path),
        })
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read contents of a file with an optional line range"
    }

    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let input: FileReadInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let result = self.read(&input)?;
        Ok(serde_json::to_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.rs");
        std::fs::write(&path, "line one\nline two\nline three\n").unwrap();

        let tool = FileReadTool::new(10);
        let result = tool
            .run(serde_json::json!({"file_path": path.display().to_string()}))
            .await
            .unwrap();
        let result: FileReadResult = serde_json::from_value(result).unwrap();

        assert_eq!(result.total_lines, 3);
        assert_eq!(result.language.as_deref(), Some("rust"));
        assert!(result.content.contains("line two"));
    }

    #[tokio::test]
    async fn test_read_line_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.py");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();

        let tool = FileReadTool::new(10);
        let result = tool
            .run(serde_json::json!({
                "file_path": path.display().to_string(),
                "start_line": 2,
                "end_line": 3,
            }))
            .await
            .unwrap();
        let result: FileReadResult = serde_json::from_value(result).unwrap();

        assert_eq!(result.content, "b\nc");
        assert_eq!(result.language.as_deref(), Some("python"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tool = FileReadTool::new(10);
        let result = tool
            .run(serde_json::json!({"file_path": "/no/such/file.rs"}))
            .await;
        assert!(matches!(result, Err(ToolError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, "x".repeat(2 * 1024 * 1024)).unwrap();

        let tool = FileReadTool::new(1);
        let result = tool
            .run(serde_json::json!({"file_path": path.display().to_string()}))
            .await;
        assert!(matches!(result, Err(ToolError::FileTooLarge { .. })));
    }
}
