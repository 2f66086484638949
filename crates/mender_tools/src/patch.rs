//! Patch application by whole-file replacement.
//!
//! Unified-diff application is deliberately out of scope: patches arrive as
//! full replacement content, validated in dry-run mode before the executor
//! commits them.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ToolError, ToolResult};
use crate::tool::Tool;

/// One file change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSpec {
    /// Target file path
    pub file_path: String,
    /// Full replacement content
    pub content: String,
}

/// Input for the patch tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPatchInput {
    pub patches: Vec<PatchSpec>,
    /// Validate without writing
    #[serde(default)]
    pub dry_run: bool,
}

/// A patch that could not be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedPatch {
    pub file: String,
    pub error: String,
}

/// Result of applying patches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPatchResult {
    pub success: bool,
    pub applied: Vec<String>,
    pub failed: Vec<FailedPatch>,
}

/// Apply whole-file patches to the workspace.
pub struct ApplyPatchTool;

impl ApplyPatchTool {
    fn apply(&self, input: &ApplyPatchInput) -> ApplyPatchResult {
        let mut applied = Vec::new();
        let mut failed = Vec::new();

        for patch in &input.patches {
            if patch.file_path.trim().is_empty() {
                failed.push(FailedPatch {
                    file: patch.file_path.clone(),
                    error: "empty file path".to_string(),
                });
                continue;
            }

            if input.dry_run {
                applied.push(patch.file_path.clone());
                continue;
            }

            match Self::write_patch(patch) {
                Ok(()) => {
                    info!(file = %patch.file_path, "Applied patch");
                    applied.push(patch.file_path.clone());
                }
                Err(e) => failed.push(FailedPatch {
                    file: patch.file_path.clone(),
                    error: e.to_string(),
                }),
            }
        }

        ApplyPatchResult {
            success: failed.is_empty(),
            applied,
            failed,
        }
    }

    fn write_patch(patch: &PatchSpec) -> std::io::Result<()> {
        let path = Path::new(&patch.file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &patch.content)
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &'static str {
        "apply_patch"
    }

    fn description(&self) -> &'static str {
        "Apply full-content file patches to the workspace"
    }

    async fn run(&self, args: serde_json::Value) -> ToolResult<serde_json::Value> {
        let input: ApplyPatchInput =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
        Ok(serde_json::to_value(self.apply(&input))?)
    }
}
