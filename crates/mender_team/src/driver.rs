//! The run driver: executes the turn loop end-to-end.
//!
//! Streaming mode applies extraction after every turn and can be observed
//! through the event channel; batch mode extracts once over the full
//! transcript at the end. Either way the loop exits the instant a terminal
//! condition is detected, and any error from the model or tool layer is
//! caught here and folded into a failed [`RunResult`] — the driver never
//! retries and never raises.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mender_core::config::TeamConfig;
use mender_core::extract;
use mender_core::task::{Message, RunResult, StopReason, TaskContext};
use mender_llm::ChatClient;
use mender_memory::SimilarCase;
use mender_tools::ToolRegistry;

use crate::error::{TeamError, TeamResult};
use crate::events::TeamEvent;
use crate::metrics::MetricsCollector;
use crate::roles::RoleKind;
use crate::team::{NextRole, Team};
use crate::termination::TerminationEvaluator;
use crate::turn;

/// At most this many similar cases are woven into the initial prompt,
/// regardless of how many the memory bridge returned.
const MAX_PROMPT_CASES: usize = 3;

/// Drives one run of the assembled team.
pub struct TeamRunner {
    team: Team,
    clients: HashMap<RoleKind, Arc<dyn ChatClient>>,
    registry: ToolRegistry,
    evaluator: TerminationEvaluator,
    max_tool_iterations: u32,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<TeamEvent>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl TeamRunner {
    /// Build a runner over an assembled team.
    ///
    /// Every team role must have a model client; a missing binding is a
    /// configuration error and the run never starts.
    pub fn new(
        team: Team,
        clients: HashMap<RoleKind, Arc<dyn ChatClient>>,
        registry: ToolRegistry,
        config: &TeamConfig,
    ) -> TeamResult<Self> {
        for role in team.roles() {
            if !clients.contains_key(&role.kind) {
                return Err(TeamError::Configuration(format!(
                    "no model client for role: {}",
                    role.name()
                )));
            }
        }

        Ok(Self {
            team,
            clients,
            registry,
            evaluator: TerminationEvaluator::new(config.max_rounds),
            max_tool_iterations: config.max_tool_iterations,
            cancel: CancellationToken::new(),
            events: None,
            metrics: None,
        })
    }

    /// Attach a cancellation token; cancelling it terminates the run with
    /// an inconclusive result instead of hanging on the in-flight call.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach an event channel for incremental observation.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TeamEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Attach the metrics collector.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn emit(&self, event: TeamEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Compose the initial team prompt from the bug report, the task id
    /// and up to three similar past cases.
    pub fn compose_initial_message(
        bug_report: &str,
        task_id: &str,
        similar: Option<&[SimilarCase]>,
    ) -> String {
        let mut message = format!("## Bug Report\n{}\n\n## Task ID: {}\n", bug_report, task_id);

        if let Some(cases) = similar.filter(|cases| !cases.is_empty()) {
            message.push_str("\n## Similar Past Solutions\n");
            for (index, case) in cases.iter().take(MAX_PROMPT_CASES).enumerate() {
                message.push_str(&format!(
                    "\n### Solution {} (Similarity: {:.2})\n{}\n",
                    index + 1,
                    case.similarity,
                    case.content
                ));
                if let Ok(metadata) = serde_json::to_string_pretty(&case.metadata) {
                    message.push_str(&format!("Context: {}\n", metadata));
                }
            }
        }

        message.push_str(
            "\n## Instructions\nPlease analyze this bug report and work together to create a \
             fix. Start by creating a detailed plan, then locate the relevant code, implement \
             a fix, test it, and validate the solution.",
        );

        message
    }

    /// Execute the run and build the result.
    pub async fn run(
        &self,
        initial_message: &str,
        context: &mut TaskContext,
        streaming: bool,
    ) -> RunResult {
        let start = Instant::now();
        let mut transcript = vec![Message::user(initial_message)];

        let outcome = self
            .run_loop(&mut transcript, context, streaming)
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(stop_reason) => {
                if !streaming {
                    // Batch mode: extraction happens once over the full
                    // transcript, skipping the caller's opening message.
                    for message in transcript.iter().skip(1) {
                        extract::apply_message(context, &message.content);
                    }
                }

                let success = stop_reason.is_success();
                let solution = if success {
                    Some(extract::extract_solution(&transcript))
                } else {
                    None
                };

                info!(
                    task_id = %context.task_id,
                    stop_reason = %stop_reason,
                    rounds = context.iteration,
                    "Run finished"
                );
                self.emit(TeamEvent::TaskCompleted {
                    task_id: context.task_id.clone(),
                    success,
                    stop_reason,
                });

                RunResult {
                    task_id: context.task_id.clone(),
                    success,
                    stop_reason: Some(stop_reason),
                    solution,
                    transcript,
                    context: context.clone(),
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                let error_text = e.to_string();
                warn!(task_id = %context.task_id, error = %error_text, "Run aborted");
                self.emit(TeamEvent::Error {
                    task_id: context.task_id.clone(),
                    error: error_text.clone(),
                });

                RunResult {
                    task_id: context.task_id.clone(),
                    success: false,
                    stop_reason: None,
                    solution: None,
                    transcript,
                    context: context.clone(),
                    error: Some(error_text),
                    duration_ms,
                }
            }
        }
    }

    async fn run_loop(
        &self,
        transcript: &mut Vec<Message>,
        context: &mut TaskContext,
        streaming: bool,
    ) -> TeamResult<StopReason> {
        let mut current = self.team.first().kind;
        let mut rounds_completed: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            let role = self.team.role(current)?;
            let client = self
                .clients
                .get(&current)
                .ok_or_else(|| TeamError::UnknownRole(current.as_str().to_string()))?;

            self.emit(TeamEvent::TurnStarted {
                round: rounds_completed,
                role: current,
            });

            let turn_start = Instant::now();
            let (output, usage) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(StopReason::Cancelled),
                result = turn::take_turn(
                    role,
                    client,
                    &self.registry,
                    transcript,
                    self.max_tool_iterations,
                    self.events.as_ref(),
                ) => result?,
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_role_call(
                    role.name(),
                    turn_start.elapsed().as_millis() as u64,
                    usage.input_tokens + usage.output_tokens,
                );
            }

            let message = Message::from_source(role.name(), output.clone());
            transcript.push(message.clone());
            rounds_completed += 1;
            context.iteration = rounds_completed;

            if streaming {
                extract::apply_message(context, &output);
            }

            self.emit(TeamEvent::TurnCompleted {
                round: rounds_completed,
                role: current,
                message,
            });

            // Marker and escalation conditions first, then the round bound.
            if let Some(reason) = self.evaluator.check_output(&output) {
                return Ok(reason);
            }
            if let Some(reason) = self.evaluator.check_rounds(rounds_completed) {
                return Ok(reason);
            }

            current = match self.team.next_role(current, &output) {
                NextRole::Role(kind) => kind,
                NextRole::Escalate => return Ok(StopReason::HumanEscalation),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mender_core::config::CoordinationMode;
    use mender_llm::MockChatClient;

    fn client(script: Vec<&str>) -> Arc<dyn ChatClient> {
        Arc::new(MockChatClient::new().with_responses(
            script.into_iter().map(String::from).collect(),
        ))
    }

    fn clients_for(team: &Team, script: &dyn Fn(RoleKind) -> Vec<&'static str>) -> HashMap<RoleKind, Arc<dyn ChatClient>> {
        team.roles()
            .iter()
            .map(|role| (role.kind, client(script(role.kind))))
            .collect()
    }

    fn config() -> TeamConfig {
        TeamConfig {
            max_rounds: 5,
            ..TeamConfig::default()
        }
    }

    fn runner_with(config: &TeamConfig, script: &dyn Fn(RoleKind) -> Vec<&'static str>) -> TeamRunner {
        let team = Team::assemble(config, false).unwrap();
        let clients = clients_for(&team, script);
        TeamRunner::new(team, clients, ToolRegistry::new(), config).unwrap()
    }

    #[tokio::test]
    async fn test_successful_handoff_run() {
        let runner = runner_with(&config(), &|kind| match kind {
            RoleKind::Planner => vec!["PLAN:\n- step one\n- step two\nHANDOFF: locator"],
            RoleKind::Locator => vec!["LOCATED_FILES:\n- src/auth.rs\nHANDOFF: coder"],
            RoleKind::Coder => vec!["PATCH:\nfn fixed() {}\nHANDOFF: executor"],
            RoleKind::Executor => vec!["TEST_RESULTS: 4 passed\nTASK_COMPLETE"],
            _ => vec!["unused"],
        });

        let mut context = TaskContext::new("login crashes", 5);
        let result = runner
            .run("## Bug Report\nlogin crashes", &mut context, true)
            .await;

        assert!(result.success);
        assert_eq!(result.stop_reason, Some(StopReason::Completed));
        assert_eq!(context.plan.as_deref().unwrap(), ["step one", "step two"]);
        assert_eq!(context.located_files, vec!["src/auth.rs"]);
        assert_eq!(context.proposed_patches.len(), 1);
        assert!(context.test_results.is_some());
        assert_eq!(context.iteration, 4);
        // Solution extraction picked up the patch message.
        let solution = result.solution.unwrap();
        assert_eq!(solution.patches.len(), 1);
        assert!(solution.patches[0].contains("fn fixed"));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_task_failed_stops_without_solution() {
        let runner = runner_with(&config(), &|kind| match kind {
            RoleKind::Planner => vec!["This is unreproducible. TASK_FAILED"],
            _ => vec!["unused"],
        });

        let mut context = TaskContext::new("ghost bug", 5);
        let result = runner.run("ghost bug", &mut context, true).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, Some(StopReason::Failed));
        assert!(result.solution.is_none());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_round_limit_is_inconclusive() {
        let config = TeamConfig {
            max_rounds: 5,
            coordination_mode: CoordinationMode::RoundRobin,
            ..TeamConfig::default()
        };
        let runner = runner_with(&config, &|_| vec!["still investigating"]);

        let mut context = TaskContext::new("slow bug", 5);
        let result = runner.run("slow bug", &mut context, true).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, Some(StopReason::MaxRounds));
        assert!(result.stop_reason.unwrap().is_inconclusive());
        assert_eq!(context.iteration, 5);
        assert!(context.iteration <= context.max_iterations);
        // Initial message + 5 role turns.
        assert_eq!(result.transcript.len(), 6);
    }

    #[tokio::test]
    async fn test_human_escalation_stops_run() {
        let runner = runner_with(&config(), &|kind| match kind {
            RoleKind::Planner => vec!["I need operator input. HANDOFF: human"],
            _ => vec!["unused"],
        });

        let mut context = TaskContext::new("weird bug", 5);
        let result = runner.run("weird bug", &mut context, true).await;

        assert!(!result.success);
        assert_eq!(result.stop_reason, Some(StopReason::HumanEscalation));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_failed_result() {
        let config = config();
        let team = Team::assemble(&config, false).unwrap();
        let mut clients: HashMap<RoleKind, Arc<dyn ChatClient>> =
            clients_for(&team, &|_| vec!["unused"]);
        clients.insert(
            RoleKind::Planner,
            Arc::new(MockChatClient::new().simulate_failure("connection reset")),
        );
        let runner = TeamRunner::new(team, clients, ToolRegistry::new(), &config).unwrap();

        let mut context = TaskContext::new("bug", 5);
        let result = runner.run("bug", &mut context, true).await;

        assert!(!result.success);
        assert!(result.stop_reason.is_none());
        assert!(result.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_cancellation_is_inconclusive() {
        let runner = runner_with(&config(), &|_| vec!["still going"]);
        let token = CancellationToken::new();
        token.cancel();
        let runner = runner.with_cancellation(token);

        let mut context = TaskContext::new("bug", 5);
        let result = runner.run("bug", &mut context, true).await;

        assert_eq!(result.stop_reason, Some(StopReason::Cancelled));
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_batch_extraction_matches_streaming() {
        let script = |kind: RoleKind| match kind {
            RoleKind::Planner => vec!["PLAN:\n- fix\nHANDOFF: locator"],
            RoleKind::Locator => vec!["LOCATED_FILES:\n- a.rs\nHANDOFF: coder"],
            RoleKind::Coder => vec!["PATCH:\nchange\nHANDOFF: executor"],
            RoleKind::Executor => vec!["TEST_RESULTS: ok\nTASK_COMPLETE"],
            _ => vec!["unused"],
        };

        let mut streamed = TaskContext::new("bug", 5);
        runner_with(&config(), &script)
            .run("bug", &mut streamed, true)
            .await;

        let mut batched = TaskContext::new("bug", 5);
        runner_with(&config(), &script)
            .run("bug", &mut batched, false)
            .await;

        assert_eq!(streamed.plan, batched.plan);
        assert_eq!(streamed.located_files, batched.located_files);
        assert_eq!(
            streamed.proposed_patches.len(),
            batched.proposed_patches.len()
        );
    }

    #[tokio::test]
    async fn test_streaming_events_are_emitted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let runner = runner_with(&config(), &|kind| match kind {
            RoleKind::Planner => vec!["TASK_COMPLETE"],
            _ => vec!["unused"],
        })
        .with_events(tx);

        let mut context = TaskContext::new("bug", 5);
        runner.run("bug", &mut context, true).await;

        let mut saw_turn_started = false;
        let mut saw_task_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                TeamEvent::TurnStarted { .. } => saw_turn_started = true,
                TeamEvent::TaskCompleted { success, .. } => {
                    saw_task_completed = true;
                    assert!(success);
                }
                _ => {}
            }
        }
        assert!(saw_turn_started);
        assert!(saw_task_completed);
    }

    #[test]
    fn test_initial_message_without_similar_cases() {
        let message = TeamRunner::compose_initial_message(
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'",
            "task-1",
            None,
        );
        assert!(message.contains("TypeError: unsupported operand type(s) for +: 'int' and 'str'"));
        assert!(message.contains("## Task ID: task-1"));
        assert!(!message.contains("Similar Past Solutions"));
        assert!(message.contains("## Instructions"));
    }

    #[test]
    fn test_initial_message_caps_similar_cases_at_three() {
        let cases: Vec<SimilarCase> = (0..5)
            .map(|i| SimilarCase {
                content: format!("case {}", i),
                metadata: Default::default(),
                similarity: 0.9 - i as f32 * 0.01,
            })
            .collect();

        let message = TeamRunner::compose_initial_message("bug", "task-2", Some(&cases));
        assert!(message.contains("## Similar Past Solutions"));
        assert!(message.contains("### Solution 1 (Similarity: 0.90)"));
        assert!(message.contains("### Solution 3"));
        assert!(!message.contains("### Solution 4"));
    }
}
