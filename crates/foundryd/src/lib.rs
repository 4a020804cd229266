//! HTTP surface for the orchestrator.
//!
//! - `POST /tasks/`: accepts a task description and acknowledges it
//! - `GET /health`: service health report
//! - `POST /workflows`: runs the four-stage workflow and returns its result

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use foundry_core::{
    health_check, FoundryConfig, HealthReport, TaskDispatcher, WorkflowResult, WorkflowRunner,
    WorkflowSpec,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    runner: WorkflowRunner,
    config: Arc<FoundryConfig>,
}

impl AppState {
    pub fn new(dispatcher: TaskDispatcher, config: FoundryConfig) -> Self {
        Self {
            runner: WorkflowRunner::new(Arc::new(dispatcher)),
            config: Arc::new(config),
        }
    }

    /// Simulated dispatcher and empty configuration.
    pub fn simulated() -> Self {
        Self::new(TaskDispatcher::simulated(), FoundryConfig::simulated())
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskSubmission {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct TaskAck {
    pub status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tasks/", post(submit_task))
        .route("/health", get(health))
        .route("/workflows", post(run_workflow))
        .with_state(state)
}

async fn submit_task(Json(task): Json<TaskSubmission>) -> Json<TaskAck> {
    info!(
        event = "task_received",
        task_id = %Uuid::new_v4(),
        description = %task.description,
        "task received"
    );
    Json(TaskAck {
        status: "Task received",
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(health_check(state.runner.dispatcher(), &state.config).await)
}

async fn run_workflow(
    State(state): State<AppState>,
    Json(spec): Json<WorkflowSpec>,
) -> Json<WorkflowResult> {
    Json(state.runner.run_workflow(spec).await)
}
