//! Fixed four-stage workflow: coordinator → analyst → generator → validator.
//!
//! The coordinator always runs and gates the rest. Each optional stage gets
//! the coordinator's result as context. The analyst's result is folded into
//! the generator input and the generator's result into the validator input.
//!
//! Failure policy: a coordinator `error` fails the workflow before any other
//! stage runs. A [`WorkflowError`] raised by a later stage also fails the
//! whole workflow, and the stage results already collected are dropped. A
//! stage whose own dispatch comes back as `error` is recorded like any other
//! response and does not stop the pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::dispatch::{TaskDispatcher, TaskRequest, TaskResponse};
use crate::error::{StageResult, WorkflowError};
use crate::obs::{
    emit_workflow_failed, emit_workflow_finished, emit_workflow_started, workflow_span,
};
use crate::roles::AgentRole;

/// Key under which the analyst result is folded into the generator input.
pub const ANALYSIS_RESULTS_KEY: &str = "analysis_results";

/// Key under which the generator result is folded into the validator input.
pub const CONTENT_TO_VALIDATE_KEY: &str = "content_to_validate";

fn default_workflow_id() -> String {
    "default".to_string()
}

fn enabled() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Caller-supplied workflow description.
///
/// Fields not named here are kept in `extra` and forwarded to the
/// coordinator along with everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default = "default_workflow_id")]
    pub workflow_id: String,
    #[serde(default = "enabled")]
    pub require_analysis: bool,
    #[serde(default = "enabled")]
    pub require_generation: bool,
    #[serde(default = "enabled")]
    pub require_validation: bool,
    #[serde(default = "empty_object")]
    pub analysis_data: Value,
    #[serde(default = "empty_object")]
    pub generation_data: Value,
    #[serde(default = "empty_object")]
    pub validation_criteria: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowSpec {
    /// All stages enabled, empty stage inputs.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            require_analysis: true,
            require_generation: true,
            require_validation: true,
            analysis_data: empty_object(),
            generation_data: empty_object(),
            validation_criteria: empty_object(),
            extra: Map::new(),
        }
    }
}

impl Default for WorkflowSpec {
    fn default() -> Self {
        Self::new(default_workflow_id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    InProgress,
    Completed,
    Failed,
}

/// Aggregated outcome of a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinator_plan: Option<Map<String, Value>>,
    pub agent_results: BTreeMap<AgentRole, TaskResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_execution_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    fn in_progress(workflow_id: &str, plan: Map<String, Value>) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            status: WorkflowStatus::InProgress,
            coordinator_plan: Some(plan),
            agent_results: BTreeMap::new(),
            start_time: Some(Utc::now()),
            end_time: None,
            total_execution_time: None,
            error: None,
        }
    }

    fn complete(mut self, started: Instant) -> Self {
        self.status = WorkflowStatus::Completed;
        self.end_time = Some(Utc::now());
        self.total_execution_time = Some(started.elapsed().as_secs_f64());
        self
    }

    /// A failed run keeps only its id, the error and the end time.
    fn failed(workflow_id: &str, error: String) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            status: WorkflowStatus::Failed,
            coordinator_plan: None,
            agent_results: BTreeMap::new(),
            start_time: None,
            end_time: Some(Utc::now()),
            total_execution_time: None,
            error: Some(error),
        }
    }
}

/// Drives the fixed pipeline over a shared [`TaskDispatcher`].
#[derive(Clone)]
pub struct WorkflowRunner {
    dispatcher: Arc<TaskDispatcher>,
}

impl WorkflowRunner {
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    /// Run the pipeline. Never returns an error; failures are reported in
    /// the result's `status` and `error`.
    pub async fn run_workflow(&self, spec: WorkflowSpec) -> WorkflowResult {
        let workflow_id = spec.workflow_id.clone();
        let span = workflow_span(&workflow_id);

        async move {
            emit_workflow_started(&workflow_id);
            match self.run_stages(spec).await {
                Ok(result) => {
                    emit_workflow_finished(
                        &workflow_id,
                        result.agent_results.len(),
                        result.total_execution_time.unwrap_or_default(),
                    );
                    result
                }
                Err(e) => {
                    emit_workflow_failed(&workflow_id, &e);
                    WorkflowResult::failed(&workflow_id, e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(&self, spec: WorkflowSpec) -> StageResult<WorkflowResult> {
        let id = spec.workflow_id.as_str();

        let coordinator = self
            .dispatcher
            .dispatch(
                TaskRequest::new(
                    format!("{id}_coordinator"),
                    AgentRole::Coordinator,
                    serde_json::to_value(&spec)?,
                )
                .with_priority(1),
            )
            .await;

        if !coordinator.is_ok() {
            return Err(WorkflowError::CoordinatorFailed(
                coordinator.error().unwrap_or_default().to_string(),
            ));
        }

        let plan = coordinator.result().clone();
        let started = Instant::now();
        let mut result = WorkflowResult::in_progress(id, plan.clone());

        if spec.require_analysis {
            let request = TaskRequest::new(
                format!("{id}_analyst"),
                AgentRole::Analyst,
                spec.analysis_data.clone(),
            )
            .with_context(plan.clone())
            .with_priority(2);
            let response = self.dispatcher.dispatch(request).await;
            result.agent_results.insert(AgentRole::Analyst, response);
        }

        if spec.require_generation {
            let mut input = spec.generation_data.clone();
            if let Some(analyst) = result.agent_results.get(&AgentRole::Analyst) {
                fold_result(&mut input, AgentRole::Generator, ANALYSIS_RESULTS_KEY, analyst)?;
            }
            let request = TaskRequest::new(format!("{id}_generator"), AgentRole::Generator, input)
                .with_context(plan.clone())
                .with_priority(3);
            let response = self.dispatcher.dispatch(request).await;
            result.agent_results.insert(AgentRole::Generator, response);
        }

        if spec.require_validation {
            let mut input = spec.validation_criteria.clone();
            if let Some(generator) = result.agent_results.get(&AgentRole::Generator) {
                fold_result(
                    &mut input,
                    AgentRole::Validator,
                    CONTENT_TO_VALIDATE_KEY,
                    generator,
                )?;
            }
            let request = TaskRequest::new(format!("{id}_validator"), AgentRole::Validator, input)
                .with_context(plan)
                .with_priority(4);
            let response = self.dispatcher.dispatch(request).await;
            result.agent_results.insert(AgentRole::Validator, response);
        }

        Ok(result.complete(started))
    }
}

fn fold_result(
    input: &mut Value,
    role: AgentRole,
    key: &'static str,
    previous: &TaskResponse,
) -> StageResult<()> {
    match input {
        Value::Object(map) => {
            map.insert(key.to_string(), Value::Object(previous.result().clone()));
            Ok(())
        }
        _ => Err(WorkflowError::StageInputNotMapping { role, key }),
    }
}
