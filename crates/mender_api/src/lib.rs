//! HTTP API server for BugMender.
//!
//! Task creation returns immediately and the run proceeds in a background
//! task; mid-run failures surface as a task record with `status=failed`,
//! not as an HTTP error. `/solve/stream` pushes run events and the final
//! result over server-sent events.

pub mod error;
pub mod models;

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures_util::Stream;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};

use mender_core::config::ServerConfig;
use mender_team::{DebugTeam, SolveRequest, TeamEvent};

use crate::error::ApiError;
use crate::models::{BugReportRequest, TaskEntry, TaskResponse, TaskState};

/// Shared server state.
///
/// The task registry is an in-process map guarded by a single lock; per
/// the design notes a keyed store would replace it if concurrent task
/// volume ever demands it.
#[derive(Clone)]
pub struct AppState {
    team: Option<Arc<DebugTeam>>,
    tasks: Arc<RwLock<HashMap<String, TaskEntry>>>,
}

impl AppState {
    pub fn new(team: Arc<DebugTeam>) -> Self {
        Self {
            team: Some(team),
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// State without a team, for the uninitialized surface.
    pub fn uninitialized() -> Self {
        Self {
            team: None,
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn team(&self) -> Result<Arc<DebugTeam>, ApiError> {
        self.team.clone().ok_or(ApiError::NotInitialized)
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/solve", post(create_task))
        .route("/solve/stream", post(solve_stream))
        .route("/tasks/:id", get(task_status))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn run_server(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "API server listening");
    axum::serve(listener, router(state)).await
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "BugMender",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ready",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let team = state.team()?;
    let status = team.status().await;
    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION"),
        "team": status,
    })))
}

async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<BugReportRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let team = state.team()?;
    if request.bug_report.trim().is_empty() {
        return Err(ApiError::BadRequest("bug_report must not be empty".into()));
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    let entry = TaskEntry::pending(&task_id);
    let created_at = entry.created_at;
    state.tasks.write().await.insert(task_id.clone(), entry);

    let tasks = state.tasks.clone();
    let id = task_id.clone();
    tokio::spawn(async move {
        if let Some(entry) = tasks.write().await.get_mut(&id) {
            entry.status = TaskState::Processing;
            entry.updated_at = Utc::now();
        }

        let mut solve = SolveRequest::new(&request.bug_report);
        if let Some(context) = request.context {
            solve = solve.with_context(context);
        }
        if !request.stream {
            solve = solve.batch();
        }

        let result = team.solve(solve).await;

        if let Some(entry) = tasks.write().await.get_mut(&id) {
            if let Some(error_text) = &result.error {
                entry.status = TaskState::Failed;
                entry.error = Some(error_text.clone());
            } else {
                entry.status = TaskState::Completed;
            }
            entry.result = Some(result);
            entry.updated_at = Utc::now();
        }
    });

    Ok(Json(TaskResponse {
        task_id,
        status: "pending".to_string(),
        created_at,
    }))
}

async fn task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskEntry>, ApiError> {
    state
        .tasks
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(ApiError::TaskNotFound(id))
}

async fn solve_stream(
    State(state): State<AppState>,
    Json(request): Json<BugReportRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let team = state.team()?;
    if request.bug_report.trim().is_empty() {
        return Err(ApiError::BadRequest("bug_report must not be empty".into()));
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TeamEvent>();
    let (sse_tx, sse_rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let mut solve = SolveRequest::new(&request.bug_report).with_events(event_tx);
        if let Some(context) = request.context {
            solve = solve.with_context(context);
        }

        let solve_future = team.solve(solve);
        tokio::pin!(solve_future);

        let result = loop {
            tokio::select! {
                event = event_rx.recv() => {
                    if let Some(event) = event {
                        forward_event(&sse_tx, &event);
                    }
                }
                result = &mut solve_future => break result,
            }
        };

        // Drain events emitted just before completion.
        while let Ok(event) = event_rx.try_recv() {
            forward_event(&sse_tx, &event);
        }

        match Event::default().event("result").json_data(&result) {
            Ok(event) => {
                let _ = sse_tx.send(event);
            }
            Err(e) => error!(error = %e, "Failed to serialize run result for SSE"),
        }
    });

    let stream = UnboundedReceiverStream::new(sse_rx).map(Ok::<_, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn forward_event(tx: &mpsc::UnboundedSender<Event>, event: &TeamEvent) {
    let kind = match event {
        TeamEvent::TaskCreated { .. } => "task_created",
        TeamEvent::TurnStarted { .. } => "turn_started",
        TeamEvent::ToolInvoked { .. } => "tool_invoked",
        TeamEvent::TurnCompleted { .. } => "turn_completed",
        TeamEvent::TaskCompleted { .. } => "task_completed",
        TeamEvent::Error { .. } => "error",
    };
    if let Ok(sse_event) = Event::default().event(kind).json_data(event) {
        let _ = tx.send(sse_event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use mender_core::config::Settings;
    use mender_llm::{ChatClient, MockChatClient};
    use mender_team::RoleKind;
    use tower::ServiceExt;

    fn mock_team() -> Arc<DebugTeam> {
        let mut settings = Settings::default();
        settings.team.max_rounds = 6;

        let mut builder = DebugTeam::builder(settings);
        let scripts: Vec<(RoleKind, &str)> = vec![
            (RoleKind::Planner, "PLAN:\n- fix\nHANDOFF: locator"),
            (RoleKind::Locator, "HANDOFF: coder"),
            (RoleKind::Coder, "PATCH:\nfix\nHANDOFF: executor"),
            (RoleKind::Executor, "TEST_RESULTS: ok\nTASK_COMPLETE"),
            (RoleKind::Critic, "unused"),
            (RoleKind::Reviewer, "unused"),
        ];
        for (kind, response) in scripts {
            let client: Arc<dyn ChatClient> =
                Arc::new(MockChatClient::new().add_response(response));
            builder = builder.client_for(kind, client);
        }
        Arc::new(builder.build().unwrap())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(AppState::new(mock_team()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_status_uninitialized_is_503() {
        let app = router(AppState::uninitialized());
        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_empty_bug_report_is_400() {
        let app = router(AppState::new(mock_team()));
        let response = app
            .oneshot(
                Request::post("/solve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"bug_report": "  "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_task_is_404() {
        let app = router(AppState::new(mock_team()));
        let response = app
            .oneshot(Request::get("/tasks/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_solve_and_poll_lifecycle() {
        let state = AppState::new(mock_team());
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/solve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"bug_report": "crash on login"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        let task_id = created["task_id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "pending");

        // Poll until the background run completes.
        let mut last = serde_json::Value::Null;
        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/tasks/{}", task_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            last = body_json(response).await;
            if last["status"] == "completed" || last["status"] == "failed" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(last["status"], "completed");
        assert_eq!(last["result"]["success"], true);
    }

    #[tokio::test]
    async fn test_mid_run_failure_is_failed_record_not_http_error() {
        let mut settings = Settings::default();
        settings.team.max_rounds = 4;
        let mut builder = DebugTeam::builder(settings);
        for kind in [
            RoleKind::Planner,
            RoleKind::Locator,
            RoleKind::Coder,
            RoleKind::Executor,
            RoleKind::Critic,
            RoleKind::Reviewer,
        ] {
            let client: Arc<dyn ChatClient> =
                Arc::new(MockChatClient::new().simulate_failure("provider down"));
            builder = builder.client_for(kind, client);
        }
        let state = AppState::new(Arc::new(builder.build().unwrap()));
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/solve")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"bug_report": "boom"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task_id = body_json(response).await["task_id"]
            .as_str()
            .unwrap()
            .to_string();

        let mut last = serde_json::Value::Null;
        for _ in 0..50 {
            let response = app
                .clone()
                .oneshot(
                    Request::get(format!("/tasks/{}", task_id))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            last = body_json(response).await;
            if last["status"] == "completed" || last["status"] == "failed" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(last["status"], "failed");
        assert!(last["error"].as_str().unwrap().contains("provider down"));
    }
}
