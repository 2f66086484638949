//! Marker-based extraction of structured task state from free-text output.
//!
//! Roles are not required to emit machine-parseable formats; they signal
//! structured events with fixed substring markers (`PLAN:`, `PATCH:`, ...).
//! When one message carries several markers, extraction applies them in a
//! fixed order: plan, located files, patch, test results, critique. The
//! terminal markers (`TASK_COMPLETE` / `TASK_FAILED`) are evaluated by the
//! termination layer, never here.

use chrono::Utc;
use tracing::debug;

use crate::task::{Message, PatchRecord, Solution, TaskContext, TestReport};

/// Marker substrings recognized in role output.
pub mod markers {
    pub const PLAN: &str = "PLAN:";
    pub const LOCATED_FILES: &str = "LOCATED_FILES:";
    pub const PATCH: &str = "PATCH:";
    pub const TEST_RESULTS: &str = "TEST_RESULTS:";
    pub const CRITIQUE: &str = "CRITIQUE:";
    pub const TASK_COMPLETE: &str = "TASK_COMPLETE";
    pub const TASK_FAILED: &str = "TASK_FAILED";
    pub const HANDOFF: &str = "HANDOFF:";

    /// Messages containing any of these contribute to the extracted solution.
    pub const SOLUTION_KEYWORDS: [&str; 3] = [PATCH, "FIX:", "SOLUTION:"];
}

/// Fixed description label for extracted solutions.
pub const SOLUTION_DESCRIPTION: &str = "Combined solution from agent team";

/// Whether a line opens a list item (`-`, `*`, or a numeric-dot prefix).
fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with('-') || trimmed.starts_with('*') {
        return true;
    }
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && trimmed[digits.len()..].starts_with('.')
}

/// Strip the list-item prefix from a line.
fn strip_list_prefix(line: &str) -> String {
    line.trim()
        .trim_start_matches(|c: char| {
            c == '-' || c == '*' || c == '.' || c == ' ' || c.is_ascii_digit()
        })
        .to_string()
}

/// Collect list items following the first occurrence of `marker`.
///
/// Collection stops at the first non-indented line that is not a list item;
/// blank lines are skipped.
fn collect_list_after(content: &str, marker: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for line in content.lines() {
        if !in_section {
            if line.contains(marker) {
                in_section = true;
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if is_list_item(line) {
            let item = strip_list_prefix(line);
            if !item.is_empty() {
                items.push(item);
            }
        } else if !line.starts_with(' ') {
            break;
        }
    }

    items
}

/// Extract plan steps from a message containing `PLAN:`.
pub fn extract_plan(content: &str) -> Vec<String> {
    collect_list_after(content, markers::PLAN)
}

/// Extract located file paths from a message containing `LOCATED_FILES:`.
pub fn extract_located_files(content: &str) -> Vec<String> {
    collect_list_after(content, markers::LOCATED_FILES)
}

/// The text following the first occurrence of `marker`, trimmed.
fn text_after(content: &str, marker: &str) -> Option<String> {
    content
        .find(marker)
        .map(|idx| content[idx + marker.len()..].trim().to_string())
}

/// Apply one message's markers to the task context.
///
/// One extraction per marker kind per call; replaying the same message
/// appends exactly one patch record per call. Messages without markers are
/// ignored.
pub fn apply_message(context: &mut TaskContext, content: &str) {
    if content.contains(markers::PLAN) {
        let steps = extract_plan(content);
        if !steps.is_empty() {
            debug!(task_id = %context.task_id, steps = steps.len(), "Extracted plan");
            context.plan = Some(steps);
        }
    }

    if content.contains(markers::LOCATED_FILES) {
        for file in extract_located_files(content) {
            if !context.located_files.contains(&file) {
                context.located_files.push(file);
            }
        }
    }

    if content.contains(markers::PATCH) {
        context.proposed_patches.push(PatchRecord {
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    if content.contains(markers::TEST_RESULTS) {
        context.test_results = Some(TestReport {
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    if content.contains(markers::CRITIQUE) {
        if let Some(text) = text_after(content, markers::CRITIQUE) {
            if !text.is_empty() {
                context.critique = Some(text);
            }
        }
    }
}

/// Extract the final solution from a full transcript.
///
/// Concatenates the content of every message containing a solution keyword,
/// in transcript order, under the fixed description label.
pub fn extract_solution(transcript: &[Message]) -> Solution {
    let patches: Vec<String> = transcript
        .iter()
        .filter(|m| {
            markers::SOLUTION_KEYWORDS
                .iter()
                .any(|kw| m.content.contains(kw))
        })
        .map(|m| m.content.clone())
        .collect();

    Solution {
        description: SOLUTION_DESCRIPTION.to_string(),
        patches,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_extraction() {
        let content = "Here is my analysis.\nPLAN:\n- step one\n- step two\nTASK_COMPLETE";
        assert_eq!(extract_plan(content), vec!["step one", "step two"]);
    }

    #[test]
    fn test_plan_numeric_prefixes() {
        let content = "PLAN:\n1. reproduce the crash\n2. add a regression test\n* ship it";
        assert_eq!(
            extract_plan(content),
            vec!["reproduce the crash", "add a regression test", "ship it"]
        );
    }

    #[test]
    fn test_plan_stops_at_non_list_line() {
        let content = "PLAN:\n- only step\nThat is all.\n- not collected";
        assert_eq!(extract_plan(content), vec!["only step"]);
    }

    #[test]
    fn test_plan_skips_blank_lines() {
        let content = "PLAN:\n- first\n\n- second";
        assert_eq!(extract_plan(content), vec!["first", "second"]);
    }

    #[test]
    fn test_located_files_dedup() {
        let mut ctx = TaskContext::new("bug", 5);
        let content = "LOCATED_FILES:\n- src/lib.rs\n- src/auth.rs";
        apply_message(&mut ctx, content);
        apply_message(&mut ctx, content);
        assert_eq!(ctx.located_files, vec!["src/lib.rs", "src/auth.rs"]);
    }

    #[test]
    fn test_patch_appends_one_record_per_pass() {
        let mut ctx = TaskContext::new("bug", 5);
        let content = "PATCH:\nfn fixed() {}";
        apply_message(&mut ctx, content);
        assert_eq!(ctx.proposed_patches.len(), 1);
        // Replaying the same message appends exactly one more record.
        apply_message(&mut ctx, content);
        assert_eq!(ctx.proposed_patches.len(), 2);
        assert_eq!(ctx.proposed_patches[0].content, content);
    }

    #[test]
    fn test_test_results_overwrite() {
        let mut ctx = TaskContext::new("bug", 5);
        apply_message(&mut ctx, "TEST_RESULTS: 3 passed");
        apply_message(&mut ctx, "TEST_RESULTS: 4 passed");
        assert!(ctx
            .test_results
            .as_ref()
            .unwrap()
            .content
            .contains("4 passed"));
    }

    #[test]
    fn test_critique_overwrite() {
        let mut ctx = TaskContext::new("bug", 5);
        apply_message(&mut ctx, "CRITIQUE: the patch misses the nil case");
        assert_eq!(
            ctx.critique.as_deref(),
            Some("the patch misses the nil case")
        );
    }

    #[test]
    fn test_multi_marker_message_applies_all_in_order() {
        // A message carrying both a patch and a plan contributes both;
        // terminal markers are left to the termination layer.
        let mut ctx = TaskContext::new("bug", 5);
        let content = "PLAN:\n- retry\nPATCH:\nfix\nTASK_COMPLETE";
        apply_message(&mut ctx, content);
        assert_eq!(ctx.plan.as_deref().unwrap(), ["retry"]);
        assert_eq!(ctx.proposed_patches.len(), 1);
    }

    #[test]
    fn test_unmatched_message_ignored() {
        let mut ctx = TaskContext::new("bug", 5);
        apply_message(&mut ctx, "Just thinking out loud here.");
        assert!(ctx.plan.is_none());
        assert!(ctx.proposed_patches.is_empty());
        assert!(ctx.test_results.is_none());
    }

    #[test]
    fn test_solution_extraction_order() {
        let transcript = vec![
            Message::from_source("planner", "PLAN:\n- fix it"),
            Message::from_source("coder", "PATCH:\nfirst fix"),
            Message::from_source("coder", "no markers here"),
            Message::from_source("reviewer", "SOLUTION: apply the first fix"),
        ];
        let solution = extract_solution(&transcript);
        assert_eq!(solution.description, SOLUTION_DESCRIPTION);
        assert_eq!(solution.patches.len(), 2);
        assert!(solution.patches[0].contains("first fix"));
        assert!(solution.patches[1].contains("SOLUTION:"));
    }
}
