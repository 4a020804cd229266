//! Structured lifecycle events for dispatches and workflow runs.
//!
//! Every emitter logs an `event = "..."` field so log pipelines can filter
//! on lifecycle transitions without parsing messages.

use tracing::{info, warn};

use crate::dispatch::TaskStatus;
use crate::roles::AgentRole;

/// Workflow-scoped span. Attach with `tracing::Instrument` so it survives
/// across `.await` points.
pub fn workflow_span(workflow_id: &str) -> tracing::Span {
    tracing::info_span!("foundry.workflow", workflow_id = %workflow_id)
}

pub fn emit_task_started(task_id: &str, role: AgentRole, simulated: bool) {
    info!(event = "task.started", task_id = %task_id, role = %role, simulated = simulated);
}

/// Errors are logged at warn level; successful and simulated tasks at info.
pub fn emit_task_finished(
    task_id: &str,
    role: AgentRole,
    status: TaskStatus,
    execution_time: f64,
    error: Option<&str>,
) {
    match error {
        Some(error) => warn!(
            event = "task.failed",
            task_id = %task_id,
            role = %role,
            execution_time = execution_time,
            error = %error,
        ),
        None => info!(
            event = "task.finished",
            task_id = %task_id,
            role = %role,
            status = %status,
            execution_time = execution_time,
        ),
    }
}

pub fn emit_workflow_started(workflow_id: &str) {
    info!(event = "workflow.started", workflow_id = %workflow_id);
}

pub fn emit_workflow_finished(workflow_id: &str, stages: usize, total_execution_time: f64) {
    info!(
        event = "workflow.finished",
        workflow_id = %workflow_id,
        stages = stages,
        total_execution_time = total_execution_time,
    );
}

pub fn emit_workflow_failed(workflow_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "workflow.failed", workflow_id = %workflow_id, error = %error);
}
