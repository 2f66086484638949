//! The debug team facade.
//!
//! Wires assembly, model clients, tools, memory and metrics together and
//! exposes the single `solve` entry point. Configuration errors surface at
//! build time; once built, `solve` always returns a [`RunResult`] and
//! never raises.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mender_core::config::Settings;
use mender_core::task::{RunResult, TaskContext};
use mender_llm::{ChatClient, LlmClient};
use mender_memory::{MemoryBridge, MemoryStats, SearchMemoryTool};
use mender_tools::patch::ApplyPatchTool;
use mender_tools::read::FileReadTool;
use mender_tools::search::CodeSearchTool;
use mender_tools::tests_tool::RunTestsTool;
use mender_tools::{SandboxRunner, ToolRegistry};

use crate::driver::TeamRunner;
use crate::error::{TeamError, TeamResult};
use crate::events::TeamEvent;
use crate::metrics::{MetricsCollector, SystemMetrics};
use crate::roles::RoleKind;
use crate::team::Team;

/// One solve invocation.
pub struct SolveRequest {
    pub bug_report: String,
    /// Optional JSON blob pre-populating known context fields
    pub context: Option<serde_json::Value>,
    /// Streaming (per-turn extraction + events) vs batch
    pub stream: bool,
    pub cancel: Option<CancellationToken>,
    pub events: Option<mpsc::UnboundedSender<TeamEvent>>,
}

impl SolveRequest {
    pub fn new(bug_report: impl Into<String>) -> Self {
        Self {
            bug_report: bug_report.into(),
            context: None,
            stream: true,
            cancel: None,
            events: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn batch(mut self) -> Self {
        self.stream = false;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_events(mut self, tx: mpsc::UnboundedSender<TeamEvent>) -> Self {
        self.events = Some(tx);
        self
    }
}

/// Status of one role, for the status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct RoleStatus {
    pub name: String,
    pub description: String,
    pub tools: Vec<String>,
}

/// System status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TeamStatus {
    pub roles: Vec<RoleStatus>,
    pub coordination_mode: String,
    pub memory_enabled: bool,
    pub max_rounds: u32,
    pub metrics: SystemMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStats>,
}

/// Builder for [`DebugTeam`].
///
/// Roles without an explicit client override get a real provider client
/// built from their configured model binding.
pub struct DebugTeamBuilder {
    settings: Settings,
    clients: HashMap<RoleKind, Arc<dyn ChatClient>>,
    sandbox: Option<Arc<dyn SandboxRunner>>,
    memory: Option<Arc<MemoryBridge>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl DebugTeamBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            clients: HashMap::new(),
            sandbox: None,
            memory: None,
            metrics: None,
        }
    }

    /// Override the model client for one role.
    pub fn client_for(mut self, kind: RoleKind, client: Arc<dyn ChatClient>) -> Self {
        self.clients.insert(kind, client);
        self
    }

    /// Attach the sandbox runner used by the test tool.
    pub fn sandbox(mut self, runner: Arc<dyn SandboxRunner>) -> Self {
        self.sandbox = Some(runner);
        self
    }

    /// Attach the memory bridge.
    pub fn memory(mut self, bridge: Arc<MemoryBridge>) -> Self {
        self.memory = Some(bridge);
        self
    }

    /// Attach a shared metrics collector.
    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Assemble the team and validate all configuration.
    pub fn build(mut self) -> TeamResult<DebugTeam> {
        let memory_enabled = self.settings.memory.enabled && self.memory.is_some();
        let team = Team::assemble(&self.settings.team, memory_enabled)?;

        for role in team.roles() {
            if !self.clients.contains_key(&role.kind) {
                let config = self.settings.model_for(role.name());
                let client = LlmClient::from_config(config)?;
                self.clients.insert(role.kind, Arc::new(client));
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CodeSearchTool));
        registry.register(Arc::new(FileReadTool::new(self.settings.max_file_size_mb)));
        registry.register(Arc::new(ApplyPatchTool));
        if let Some(sandbox) = &self.sandbox {
            registry.register(Arc::new(RunTestsTool::new(sandbox.clone())));
        }
        if memory_enabled {
            if let Some(bridge) = &self.memory {
                registry.register(Arc::new(SearchMemoryTool::new(bridge.clone())));
            }
        }

        info!(
            roles = team.roles().len(),
            memory_enabled,
            sandbox = self.sandbox.is_some(),
            "Debug team ready"
        );

        Ok(DebugTeam {
            settings: self.settings,
            team,
            clients: self.clients,
            registry,
            memory: self.memory,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

/// Orchestrates the debug role team.
pub struct DebugTeam {
    settings: Settings,
    team: Team,
    clients: HashMap<RoleKind, Arc<dyn ChatClient>>,
    registry: ToolRegistry,
    memory: Option<Arc<MemoryBridge>>,
    metrics: Arc<MetricsCollector>,
}

impl DebugTeam {
    pub fn builder(settings: Settings) -> DebugTeamBuilder {
        DebugTeamBuilder::new(settings)
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Solve a bug report with the assembled team.
    ///
    /// Never raises: every failure is folded into the returned result.
    pub async fn solve(&self, request: SolveRequest) -> RunResult {
        let start = Instant::now();
        let mut context =
            TaskContext::new(request.bug_report.clone(), self.settings.team.max_rounds);

        if let Some(blob) = &request.context {
            if let Err(e) = context.seed_from_json(blob) {
                warn!(task_id = %context.task_id, error = %e, "Ignoring invalid context blob");
            }
        }

        self.metrics.record_task_start(&context.task_id);
        if let Some(tx) = &request.events {
            let _ = tx.send(TeamEvent::TaskCreated {
                task_id: context.task_id.clone(),
            });
        }

        // Memory retrieval is best-effort; a broken bridge yields None.
        let similar = match &self.memory {
            Some(bridge) => bridge.search_similar(&request.bug_report).await,
            None => None,
        };

        let initial = TeamRunner::compose_initial_message(
            &request.bug_report,
            &context.task_id,
            similar.as_deref(),
        );

        let runner = match self.runner(&request) {
            Ok(runner) => runner,
            Err(e) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                self.metrics
                    .record_task_failure(&context.task_id, &e.to_string());
                return RunResult::from_error(context, e.to_string(), duration_ms);
            }
        };

        let result = runner.run(&initial, &mut context, request.stream).await;

        if result.success {
            if let (Some(bridge), Some(solution)) = (&self.memory, &result.solution) {
                bridge
                    .store_solution(&request.bug_report, solution, &context)
                    .await;
            }
        }

        self.metrics.record_task_completion(
            &context.task_id,
            result.success,
            start.elapsed().as_millis() as u64,
        );

        result
    }

    fn runner(&self, request: &SolveRequest) -> TeamResult<TeamRunner> {
        let mut runner = TeamRunner::new(
            self.team.clone(),
            self.clients.clone(),
            self.registry.clone(),
            &self.settings.team,
        )?
        .with_metrics(self.metrics.clone());

        if let Some(token) = &request.cancel {
            runner = runner.with_cancellation(token.clone());
        }
        if let Some(tx) = &request.events {
            runner = runner.with_events(tx.clone());
        }
        Ok(runner)
    }

    /// Snapshot of the team and system state.
    pub async fn status(&self) -> TeamStatus {
        let memory = match &self.memory {
            Some(bridge) => Some(bridge.stats().await),
            None => None,
        };

        TeamStatus {
            roles: self
                .team
                .roles()
                .iter()
                .map(|role| RoleStatus {
                    name: role.name().to_string(),
                    description: role.kind.description().to_string(),
                    tools: role.tools.clone(),
                })
                .collect(),
            coordination_mode: format!("{:?}", self.team.mode()),
            memory_enabled: self.memory.is_some() && self.settings.memory.enabled,
            max_rounds: self.settings.team.max_rounds,
            metrics: self.metrics.system_metrics(),
            memory,
        }
    }
}

impl TeamError {
    /// Whether this error is a fatal configuration problem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TeamError::UndeclaredHandoff { .. }
                | TeamError::UnknownRole(_)
                | TeamError::Configuration(_)
                | TeamError::Llm(mender_llm::LlmError::UnknownProvider(_))
                | TeamError::Llm(mender_llm::LlmError::MissingApiKey(_))
        )
    }
}
