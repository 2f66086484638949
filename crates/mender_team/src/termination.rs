//! Termination conditions.
//!
//! Four first-class stop conditions, each independently testable and each
//! producing its own [`StopReason`]. The round bound is enforced
//! structurally by the turn loop; the marker and escalation conditions are
//! evaluated over each turn's output as it arrives. When several
//! conditions match the same output, the first in the fixed order
//! (complete, failed, escalation) wins.

use mender_core::extract::markers;
use mender_core::task::StopReason;

use crate::roles::HandoffTarget;
use crate::team::Team;

/// Evaluates stop conditions after every turn.
#[derive(Debug, Clone, Copy)]
pub struct TerminationEvaluator {
    max_rounds: u32,
}

impl TerminationEvaluator {
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Condition 1: the round budget is exhausted. Inconclusive, not an
    /// error.
    pub fn rounds_exhausted(&self, rounds_completed: u32) -> bool {
        rounds_completed >= self.max_rounds
    }

    /// Condition 2: the output announces success.
    pub fn completed(output: &str) -> bool {
        output.contains(markers::TASK_COMPLETE)
    }

    /// Condition 3: the output announces failure.
    pub fn failed(output: &str) -> bool {
        output.contains(markers::TASK_FAILED)
    }

    /// Condition 4: the output hands off to the human sentinel.
    pub fn escalated(output: &str) -> bool {
        matches!(Team::parse_handoff(output), Some(HandoffTarget::Human))
    }

    /// Evaluate the marker and escalation conditions over one turn's
    /// output.
    pub fn check_output(&self, output: &str) -> Option<StopReason> {
        if Self::completed(output) {
            Some(StopReason::Completed)
        } else if Self::failed(output) {
            Some(StopReason::Failed)
        } else if Self::escalated(output) {
            Some(StopReason::HumanEscalation)
        } else {
            None
        }
    }

    /// Evaluate the round-count condition after a turn.
    pub fn check_rounds(&self, rounds_completed: u32) -> Option<StopReason> {
        if self.rounds_exhausted(rounds_completed) {
            Some(StopReason::MaxRounds)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_condition() {
        let evaluator = TerminationEvaluator::new(5);
        assert!(!evaluator.rounds_exhausted(4));
        assert!(evaluator.rounds_exhausted(5));
        assert_eq!(evaluator.check_rounds(5), Some(StopReason::MaxRounds));
        assert_eq!(evaluator.check_rounds(2), None);
    }

    #[test]
    fn test_marker_conditions() {
        assert!(TerminationEvaluator::completed("done. TASK_COMPLETE"));
        assert!(!TerminationEvaluator::completed("not done yet"));
        assert!(TerminationEvaluator::failed("giving up: TASK_FAILED"));
        assert!(TerminationEvaluator::escalated("HANDOFF: human"));
        assert!(!TerminationEvaluator::escalated("HANDOFF: coder"));
    }

    #[test]
    fn test_check_output_distinct_reasons() {
        let evaluator = TerminationEvaluator::new(5);
        assert_eq!(
            evaluator.check_output("TASK_COMPLETE"),
            Some(StopReason::Completed)
        );
        assert_eq!(
            evaluator.check_output("TASK_FAILED"),
            Some(StopReason::Failed)
        );
        assert_eq!(
            evaluator.check_output("HANDOFF: human"),
            Some(StopReason::HumanEscalation)
        );
        assert_eq!(evaluator.check_output("PLAN:\n- continue"), None);
    }

    #[test]
    fn test_complete_wins_over_failed_in_one_message() {
        let evaluator = TerminationEvaluator::new(5);
        assert_eq!(
            evaluator.check_output("TASK_COMPLETE but earlier we said TASK_FAILED"),
            Some(StopReason::Completed)
        );
    }
}
