//! Workflow runner tests: gating, stage chaining and the coarse failure policy.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foundry_core::{
    AgentRole, Completion, CompletionBackend, CompletionError, CompletionRequest,
    CompletionResult, RoleRegistry, TaskDispatcher, TaskStatus, WorkflowRunner, WorkflowSpec,
    WorkflowStatus,
};
use serde_json::json;

/// Records prompts and fails any role whose system prompt mentions one of `fail_for`.
struct ScriptedBackend {
    calls: Mutex<Vec<CompletionRequest>>,
    fail_for: Vec<&'static str>,
}

impl ScriptedBackend {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_for: Vec::new(),
        }
    }

    fn failing(agents: &[&'static str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_for: agents.to_vec(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompt text (all non-system messages) of the call whose system prompt mentions `agent`.
    fn prompt_for(&self, agent: &str) -> String {
        let calls = self.calls.lock().unwrap();
        let call = calls
            .iter()
            .find(|c| c.messages[0].content.contains(agent))
            .unwrap_or_else(|| panic!("no call for {agent}"));
        call.messages[1..]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Completion> {
        let system = request.messages[0].content.clone();
        self.calls.lock().unwrap().push(request);
        if self.fail_for.iter().any(|agent| system.contains(agent)) {
            return Err(CompletionError::Unavailable("scripted failure".to_string()));
        }
        Ok(Completion {
            content: "ok".to_string(),
            total_tokens: 7,
        })
    }
}

fn runner_with(backend: Arc<ScriptedBackend>) -> WorkflowRunner {
    WorkflowRunner::new(Arc::new(TaskDispatcher::new(
        RoleRegistry::standard(),
        Some(backend as Arc<dyn CompletionBackend>),
    )))
}

fn simulated_runner() -> WorkflowRunner {
    WorkflowRunner::new(Arc::new(TaskDispatcher::simulated()))
}

#[tokio::test]
async fn test_all_optional_stages_disabled_completes_with_no_agent_results() {
    let spec: WorkflowSpec = serde_json::from_value(json!({
        "workflow_id": "w1",
        "require_analysis": false,
        "require_generation": false,
        "require_validation": false
    }))
    .unwrap();

    let result = simulated_runner().run_workflow(spec).await;

    assert_eq!(result.workflow_id, "w1");
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert!(result.agent_results.is_empty());
    assert!(result.coordinator_plan.is_some());
    assert!(result.total_execution_time.is_some());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["agent_results"], json!({}));
    assert_eq!(json["status"], "completed");
}

#[tokio::test]
async fn test_full_simulated_workflow_runs_every_stage() {
    let result = simulated_runner()
        .run_workflow(WorkflowSpec::new("demo"))
        .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    let roles: Vec<AgentRole> = result.agent_results.keys().copied().collect();
    assert_eq!(
        roles,
        vec![AgentRole::Analyst, AgentRole::Generator, AgentRole::Validator]
    );
    assert!(result
        .agent_results
        .values()
        .all(|r| r.status() == TaskStatus::Simulated));
    assert_eq!(result.agent_results[&AgentRole::Generator].task_id(), "demo_generator");

    let plan = result.coordinator_plan.unwrap();
    assert_eq!(
        plan["task_assignments"],
        json!(["analyst", "generator", "validator"])
    );
}

#[tokio::test]
async fn test_coordinator_error_fails_workflow_without_other_dispatches() {
    let backend = Arc::new(ScriptedBackend::failing(&["Coordinator Agent"]));
    let result = runner_with(backend.clone())
        .run_workflow(WorkflowSpec::new("w2"))
        .await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert!(result.agent_results.is_empty());
    let error = result.error.expect("workflow error");
    assert!(error.starts_with("Coordinator failed:"), "got: {error}");
    assert!(error.contains("scripted failure"));
    assert_eq!(backend.call_count(), 1, "no stage may run after the coordinator fails");
}

#[tokio::test]
async fn test_stage_outputs_are_folded_into_downstream_inputs() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut spec = WorkflowSpec::new("w3");
    spec.analysis_data = json!({"dataset": "q3-sales"});
    spec.generation_data = json!({"format": "summary"});
    spec.validation_criteria = json!({"standard": "SOX"});
    spec.extra
        .insert("objective".to_string(), json!("quarterly review"));

    let result = runner_with(backend.clone()).run_workflow(spec).await;
    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(backend.call_count(), 4);

    let coordinator_prompt = backend.prompt_for("Coordinator Agent");
    assert!(coordinator_prompt.contains("objective: quarterly review"));
    assert!(coordinator_prompt.contains("workflow_id: w3"));

    let analyst_prompt = backend.prompt_for("Analysis Agent");
    assert!(analyst_prompt.starts_with("Context: "));
    assert!(analyst_prompt.contains("dataset: q3-sales"));

    let generator_prompt = backend.prompt_for("Generation Agent");
    assert!(generator_prompt.contains("format: summary"));
    assert!(generator_prompt.contains("analysis_results: {"));

    let validator_prompt = backend.prompt_for("Validation Agent");
    assert!(validator_prompt.contains("standard: SOX"));
    assert!(validator_prompt.contains("content_to_validate: {"));
}

#[tokio::test]
async fn test_skipped_analysis_means_no_analysis_results_key() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut spec = WorkflowSpec::new("w4");
    spec.require_analysis = false;

    let result = runner_with(backend.clone()).run_workflow(spec).await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert!(!result.agent_results.contains_key(&AgentRole::Analyst));
    assert!(!backend
        .prompt_for("Generation Agent")
        .contains("analysis_results"));
}

#[tokio::test]
async fn test_stage_dispatch_error_is_recorded_not_fatal() {
    let backend = Arc::new(ScriptedBackend::failing(&["Analysis Agent"]));
    let result = runner_with(backend.clone())
        .run_workflow(WorkflowSpec::new("w5"))
        .await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    let analyst = &result.agent_results[&AgentRole::Analyst];
    assert_eq!(analyst.status(), TaskStatus::Error);
    assert!(analyst.result().is_empty());

    // The errored analyst still feeds the generator, with an empty result.
    assert!(backend
        .prompt_for("Generation Agent")
        .contains("analysis_results: {}"));
    assert_eq!(
        result.agent_results[&AgentRole::Validator].status(),
        TaskStatus::Success
    );
}

#[tokio::test]
async fn test_stage_failure_discards_completed_stage_results() {
    let backend = Arc::new(ScriptedBackend::new());
    let mut spec = WorkflowSpec::new("w6");
    spec.generation_data = json!("write something");

    let result = runner_with(backend.clone()).run_workflow(spec).await;

    assert_eq!(result.status, WorkflowStatus::Failed);
    assert!(
        result.agent_results.is_empty(),
        "the analyst result is dropped with the workflow"
    );
    assert!(result.coordinator_plan.is_none());
    assert!(result.start_time.is_none());
    assert!(result.error.unwrap().contains("analysis_results"));
    // Coordinator and analyst ran before the failure; nothing after it.
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_non_mapping_stage_input_is_fine_without_folding() {
    let mut spec = WorkflowSpec::new("w7");
    spec.require_analysis = false;
    spec.require_validation = false;
    spec.generation_data = json!("write something");

    let result = simulated_runner().run_workflow(spec).await;

    assert_eq!(result.status, WorkflowStatus::Completed);
    assert_eq!(result.agent_results.len(), 1);
}
