//! Regex code search over a directory tree.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{ToolError, ToolResult};
use crate::tool::Tool;

fn default_path() -> String {
    ".".to_string()
}

fn default_max_results() -> usize {
    50
}

fn default_context_lines() -> usize {
    2
}

/// Input for the code search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchInput {
    /// Search pattern (regex supported)
    pub pattern: String,
    /// File name pattern to filter (e.g. "*.rs")
    #[serde(default)]
    pub file_pattern: Option<String>,
    /// Directory to search in
    #[serde(default = "default_path")]
    pub path: String,
    /// Maximum number of matches
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Context lines around each match
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

/// A single match with surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub file: String,
    pub line: usize,
    pub content: String,
}

/// Result of a code search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchResult {
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
    pub truncated: bool,
}

/// Search for code patterns across a source tree.
pub struct CodeSearchTool;

const SKIPPED_DIRS: [&str; 5] = [".git", "target", "node_modules", "__pycache__", ".venv"];

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| SKIPPED_DIRS.contains(&name) || name.starts_with('.'))
        .unwrap_or(false)
}

impl CodeSearchTool {
    fn search(&self, input: &CodeSearchInput) -> ToolResult<CodeSearchResult> {
        let regex = regex::Regex::new(&input.pattern)
            .map_err(|e| ToolError::InvalidPattern(e.to_string()))?;

        let file_glob = match &input.file_pattern {
            Some(pattern) => Some(
                glob::Pattern::new(pattern)
                    .map_err(|e| ToolError::InvalidPattern(e.to_string()))?,
            ),
            None => None,
        };

        let mut matches = Vec::new();
        let mut truncated = false;

        'files: for entry in WalkDir::new(&input.path)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped(e))
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if let Some(pattern) = &file_glob {
                let name = entry.file_name().to_string_lossy();
                if !pattern.matches(&name) {
                    continue;
                }
            }

            // Binary and unreadable files are skipped silently.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };

            let lines: Vec<&str> = content.lines().collect();
            for (idx, line) in lines.iter().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if matches.len() >= input.max_results {
                    truncated = true;
                    break 'files;
                }

                let start = idx.saturating_sub(input.context_lines);
                let end = (idx + input.context_lines + 1).min(lines.len());
                matches.push(SearchMatch {
                    file: entry.path().display().to_string(),
                    line: idx + 1,
                    content: lines[start..end].join("\n"),
                });
            }
        }

        Ok(CodeSearchResult {
            total_matches: matches.len(),
            truncated,
            matches,
        })
    }
}

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &'static str {
        "search_code"
    }

    fn description(&self) -> &'static str {
        "Search for code patterns with a regex over the source tree"
    }

    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let input: CodeSearchInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        let result = self.search(&input)?;
        Ok(serde_json::to_value(result)?)
    }
}
