//! Role definitions.
//!
//! Roles are data, not a class hierarchy: a [`RoleSpec`] carries a name,
//! instructions, declared tools and declared hand-off targets, and is
//! immutable once the team is assembled.

use serde::{Deserialize, Serialize};

use mender_core::error::{CoreError, CoreResult};

/// The fixed set of debugging roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Planner,
    Locator,
    Coder,
    Executor,
    Critic,
    Reviewer,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Planner => "planner",
            RoleKind::Locator => "locator",
            RoleKind::Coder => "coder",
            RoleKind::Executor => "executor",
            RoleKind::Critic => "critic",
            RoleKind::Reviewer => "reviewer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RoleKind::Planner => "Analyzes bugs and creates detailed action plans",
            RoleKind::Locator => "Searches and locates relevant code segments",
            RoleKind::Coder => "Writes clean, efficient code fixes",
            RoleKind::Executor => "Safely applies patches and runs tests",
            RoleKind::Critic => "Analyzes failures and provides actionable feedback",
            RoleKind::Reviewer => "Conducts the final code review",
        }
    }

    /// Parse a role name, e.g. from a hand-off line.
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "planner" => Ok(RoleKind::Planner),
            "locator" => Ok(RoleKind::Locator),
            "coder" => Ok(RoleKind::Coder),
            "executor" => Ok(RoleKind::Executor),
            "critic" => Ok(RoleKind::Critic),
            "reviewer" => Ok(RoleKind::Reviewer),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a role may hand the conversation next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffTarget {
    /// Another role in the team
    Role(RoleKind),
    /// Escalate to a human operator; terminates the run
    Human,
}

impl HandoffTarget {
    /// Parse a hand-off target name.
    pub fn parse(name: &str) -> CoreResult<Self> {
        if name.trim().eq_ignore_ascii_case("human") {
            return Ok(Self::Human);
        }
        RoleKind::parse(name).map(Self::Role)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role(kind) => kind.as_str(),
            Self::Human => "human",
        }
    }
}

/// Static participant descriptor, configured once at team assembly.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub kind: RoleKind,
    /// System instructions for the role's model calls
    pub instructions: String,
    /// Declared tool names
    pub tools: Vec<String>,
    /// Declared hand-off targets
    pub handoffs: Vec<HandoffTarget>,
}

impl RoleSpec {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// First declared role target, used as the hand-off fallback.
    pub fn default_next(&self) -> Option<RoleKind> {
        self.handoffs.iter().find_map(|target| match target {
            HandoffTarget::Role(kind) => Some(*kind),
            HandoffTarget::Human => None,
        })
    }

    /// Whether the role declares the given target.
    pub fn declares(&self, target: HandoffTarget) -> bool {
        self.handoffs.contains(&target)
    }

    pub fn planner() -> Self {
        Self {
            kind: RoleKind::Planner,
            instructions: PLANNER_INSTRUCTIONS.to_string(),
            tools: Vec::new(),
            handoffs: vec![HandoffTarget::Role(RoleKind::Locator), HandoffTarget::Human],
        }
    }

    pub fn locator(memory_enabled: bool) -> Self {
        let mut tools = vec!["search_code".to_string(), "read_file".to_string()];
        if memory_enabled {
            tools.push("search_memory".to_string());
        }
        Self {
            kind: RoleKind::Locator,
            instructions: LOCATOR_INSTRUCTIONS.to_string(),
            tools,
            handoffs: vec![
                HandoffTarget::Role(RoleKind::Coder),
                HandoffTarget::Role(RoleKind::Planner),
                HandoffTarget::Human,
            ],
        }
    }

    pub fn coder() -> Self {
        Self {
            kind: RoleKind::Coder,
            instructions: CODER_INSTRUCTIONS.to_string(),
            tools: vec!["read_file".to_string(), "search_code".to_string()],
            handoffs: vec![
                HandoffTarget::Role(RoleKind::Executor),
                HandoffTarget::Role(RoleKind::Locator),
                HandoffTarget::Human,
            ],
        }
    }

    /// The executor's hand-off graph depends on which optional roles exist.
    pub fn executor(enable_critic: bool, enable_reviewer: bool) -> Self {
        let mut handoffs = Vec::new();
        if enable_critic {
            handoffs.push(HandoffTarget::Role(RoleKind::Critic));
        }
        if enable_reviewer {
            handoffs.push(HandoffTarget::Role(RoleKind::Reviewer));
        }
        if handoffs.is_empty() {
            handoffs.push(HandoffTarget::Role(RoleKind::Planner));
        }
        handoffs.push(HandoffTarget::Human);

        Self {
            kind: RoleKind::Executor,
            instructions: EXECUTOR_INSTRUCTIONS.to_string(),
            tools: vec!["apply_patch".to_string(), "run_tests".to_string()],
            handoffs,
        }
    }

    pub fn critic() -> Self {
        Self {
            kind: RoleKind::Critic,
            instructions: CRITIC_INSTRUCTIONS.to_string(),
            tools: Vec::new(),
            handoffs: vec![
                HandoffTarget::Role(RoleKind::Coder),
                HandoffTarget::Role(RoleKind::Planner),
                HandoffTarget::Human,
            ],
        }
    }

    pub fn reviewer() -> Self {
        Self {
            kind: RoleKind::Reviewer,
            instructions: REVIEWER_INSTRUCTIONS.to_string(),
            tools: vec!["read_file".to_string(), "run_tests".to_string()],
            handoffs: vec![HandoffTarget::Role(RoleKind::Coder), HandoffTarget::Human],
        }
    }
}

const PLANNER_INSTRUCTIONS: &str = "\
You are the planning specialist of a debugging team. Analyze the bug report \
and produce a concrete, ordered plan. Output the plan under a `PLAN:` marker \
as a dashed list, one actionable step per line. When the plan is ready, hand \
off with `HANDOFF: locator`.";

const LOCATOR_INSTRUCTIONS: &str = "\
You are the code location specialist. Use your tools to find the files and \
functions involved in the reported defect. List them under a \
`LOCATED_FILES:` marker as a dashed list. Hand off to the coder with \
`HANDOFF: coder`, or back to the planner with `HANDOFF: planner` if the plan \
needs revision.";

const CODER_INSTRUCTIONS: &str = "\
You are the fix specialist. Write a minimal, correct fix for the located \
defect and present it under a `PATCH:` marker. Hand off to the executor with \
`HANDOFF: executor`, or back to the locator with `HANDOFF: locator` if more \
context is needed.";

const EXECUTOR_INSTRUCTIONS: &str = "\
You are the execution specialist. Apply the proposed patch and run the test \
suite with your tools. Report the outcome under a `TEST_RESULTS:` marker. If \
everything passes and the fix is validated, emit `TASK_COMPLETE`. If the \
approach is hopeless, emit `TASK_FAILED`. Otherwise hand off for critique or \
review.";

const CRITIC_INSTRUCTIONS: &str = "\
You are the failure analyst. Examine the latest test results and patch, and \
give precise, actionable feedback under a `CRITIQUE:` marker. Hand off to \
the coder with `HANDOFF: coder`, or to the planner with `HANDOFF: planner` \
when the whole approach must change.";

const REVIEWER_INSTRUCTIONS: &str = "\
You are the senior reviewer. Check the validated fix for correctness and \
maintainability. Approve by emitting `TASK_COMPLETE`, or request changes \
from the coder with `HANDOFF: coder`.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(RoleKind::parse("planner").unwrap(), RoleKind::Planner);
        assert_eq!(RoleKind::parse(" Coder ").unwrap(), RoleKind::Coder);
        assert!(RoleKind::parse("wizard").is_err());
    }

    #[test]
    fn test_handoff_target_parsing() {
        assert_eq!(HandoffTarget::parse("human").unwrap(), HandoffTarget::Human);
        assert_eq!(
            HandoffTarget::parse("reviewer").unwrap(),
            HandoffTarget::Role(RoleKind::Reviewer)
        );
        assert!(HandoffTarget::parse("nobody").is_err());
    }

    #[test]
    fn test_executor_handoffs_follow_toggles() {
        let both = RoleSpec::executor(true, true);
        assert!(both.declares(HandoffTarget::Role(RoleKind::Critic)));
        assert!(both.declares(HandoffTarget::Role(RoleKind::Reviewer)));

        let reviewer_only = RoleSpec::executor(false, true);
        assert!(!reviewer_only.declares(HandoffTarget::Role(RoleKind::Critic)));
        assert_eq!(reviewer_only.default_next(), Some(RoleKind::Reviewer));

        // With neither optional role the executor loops back to the planner.
        let neither = RoleSpec::executor(false, false);
        assert_eq!(neither.default_next(), Some(RoleKind::Planner));
    }

    #[test]
    fn test_locator_memory_tool_toggle() {
        assert!(RoleSpec::locator(true)
            .tools
            .contains(&"search_memory".to_string()));
        assert!(!RoleSpec::locator(false)
            .tools
            .contains(&"search_memory".to_string()));
    }

    #[test]
    fn test_default_next_skips_human() {
        let planner = RoleSpec::planner();
        assert_eq!(planner.default_next(), Some(RoleKind::Locator));
    }
}
