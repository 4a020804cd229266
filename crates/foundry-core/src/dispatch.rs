//! Task dispatch: one role, one prompt, one completion call, one envelope.
//!
//! [`TaskDispatcher::dispatch`] never returns an error. Backend failures and
//! timeouts become `error` envelopes, and a dispatcher built without a
//! backend answers every task with canned `simulated` data.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{instrument, warn};

use crate::completion::{
    ChatMessage, Completion, CompletionBackend, CompletionRequest, HttpCompletionBackend,
};
use crate::config::FoundryConfig;
use crate::error::{ConfigError, DispatchError};
use crate::obs::{emit_task_finished, emit_task_started};
use crate::roles::{AgentRole, RoleConfig, RoleRegistry};

/// Default per-task timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Outcome class of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Simulated,
    Error,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Success => "success",
            TaskStatus::Simulated => "simulated",
            TaskStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_priority() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// A unit of work for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub task_id: String,
    pub role: AgentRole,
    /// Usually a mapping; any other value is stringified into the prompt.
    #[serde(default = "empty_object")]
    pub input_data: Value,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    /// Bookkeeping only.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TaskRequest {
    pub fn new(task_id: impl Into<String>, role: AgentRole, input_data: Value) -> Self {
        Self {
            task_id: task_id.into(),
            role,
            input_data,
            context: None,
            priority: default_priority(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Uniform response envelope for a dispatch.
///
/// `status` is `error` exactly when `error` is set, and then `result` is
/// empty. The dispatcher builds envelopes through private constructors;
/// deserialized envelopes are checked against the same invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskResponse")]
pub struct TaskResponse {
    task_id: String,
    role: AgentRole,
    status: TaskStatus,
    result: Map<String, Value>,
    metadata: Map<String, Value>,
    execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Wire form of [`TaskResponse`] before validation.
#[derive(Deserialize)]
struct RawTaskResponse {
    task_id: String,
    role: AgentRole,
    status: TaskStatus,
    #[serde(default)]
    result: Map<String, Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    execution_time: f64,
    #[serde(default)]
    error: Option<String>,
}

impl TryFrom<RawTaskResponse> for TaskResponse {
    type Error = DispatchError;

    fn try_from(raw: RawTaskResponse) -> Result<Self, Self::Error> {
        let reason = match (raw.status, raw.error.is_some()) {
            (TaskStatus::Error, false) => Some("error status without an error message"),
            (TaskStatus::Error, true) if !raw.result.is_empty() => {
                Some("error status with a non-empty result")
            }
            (TaskStatus::Success | TaskStatus::Simulated, true) => {
                Some("error message on a non-error status")
            }
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(DispatchError::InvalidEnvelope {
                task_id: raw.task_id,
                reason,
            });
        }

        Ok(Self {
            task_id: raw.task_id,
            role: raw.role,
            status: raw.status,
            result: raw.result,
            metadata: raw.metadata,
            execution_time: raw.execution_time,
            error: raw.error,
        })
    }
}

impl TaskResponse {
    fn completed(
        request: &TaskRequest,
        status: TaskStatus,
        result: Map<String, Value>,
        metadata: Map<String, Value>,
        execution_time: f64,
    ) -> Self {
        Self {
            task_id: request.task_id.clone(),
            role: request.role,
            status,
            result,
            metadata,
            execution_time,
            error: None,
        }
    }

    fn failed(request: &TaskRequest, error: String, execution_time: f64) -> Self {
        Self {
            task_id: request.task_id.clone(),
            role: request.role,
            status: TaskStatus::Error,
            result: Map::new(),
            metadata: Map::new(),
            execution_time,
            error: Some(error),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> &Map<String, Value> {
        &self.result
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Wall-clock seconds spent in the dispatch.
    pub fn execution_time(&self) -> f64 {
        self.execution_time
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `success` or `simulated`.
    pub fn is_ok(&self) -> bool {
        self.status != TaskStatus::Error
    }
}

/// Turns [`TaskRequest`]s into [`TaskResponse`]s for the four roles.
#[derive(Clone)]
pub struct TaskDispatcher {
    registry: RoleRegistry,
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl TaskDispatcher {
    /// `backend = None` selects simulated mode.
    pub fn new(registry: RoleRegistry, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Self { registry, backend }
    }

    /// A dispatcher that never leaves the process.
    pub fn simulated() -> Self {
        Self::new(RoleRegistry::standard(), None)
    }

    /// Build the registry and HTTP backend described by `config`.
    pub fn from_config(config: &FoundryConfig) -> Result<Self, ConfigError> {
        let registry = match &config.model_override {
            Some(model) => RoleRegistry::standard().with_model(model),
            None => RoleRegistry::standard(),
        };

        let backend: Option<Arc<dyn CompletionBackend>> = match &config.completion {
            Some(endpoint) => Some(Arc::new(HttpCompletionBackend::new(endpoint.clone())?)),
            None => {
                warn!("no completion credentials configured; dispatching in simulated mode");
                None
            }
        };

        Ok(Self::new(registry, backend))
    }

    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    pub fn backend(&self) -> Option<&Arc<dyn CompletionBackend>> {
        self.backend.as_ref()
    }

    pub fn is_simulated(&self) -> bool {
        self.backend.is_none()
    }

    /// Run one task against its role.
    #[instrument(skip(self, request), fields(task_id = %request.task_id, role = %request.role))]
    pub async fn dispatch(&self, request: TaskRequest) -> TaskResponse {
        let start = Instant::now();
        let config = self.registry.get(request.role);
        emit_task_started(&request.task_id, request.role, self.is_simulated());

        let response = match &self.backend {
            None => TaskResponse::completed(
                &request,
                TaskStatus::Simulated,
                simulated_result(request.role),
                simulated_metadata(config),
                start.elapsed().as_secs_f64(),
            ),
            Some(backend) => {
                let completion_request = CompletionRequest {
                    model: config.model.clone(),
                    messages: build_messages(config, &request),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                    timeout: Duration::from_secs(request.timeout_secs),
                };

                match complete_within(backend.as_ref(), completion_request, request.timeout_secs)
                    .await
                {
                    Ok(completion) => TaskResponse::completed(
                        &request,
                        TaskStatus::Success,
                        shaped_result(request.role, &completion.content),
                        success_metadata(config, completion.total_tokens),
                        start.elapsed().as_secs_f64(),
                    ),
                    Err(e) => {
                        TaskResponse::failed(&request, e.to_string(), start.elapsed().as_secs_f64())
                    }
                }
            }
        };

        emit_task_finished(
            response.task_id(),
            response.role(),
            response.status(),
            response.execution_time(),
            response.error(),
        );
        response
    }

    /// Dispatch every request concurrently and wait for all of them.
    ///
    /// Responses come back in request order regardless of completion order.
    pub async fn dispatch_all(&self, requests: Vec<TaskRequest>) -> Vec<TaskResponse> {
        join_all(requests.into_iter().map(|request| self.dispatch(request))).await
    }
}

async fn complete_within(
    backend: &dyn CompletionBackend,
    request: CompletionRequest,
    timeout_secs: u64,
) -> Result<Completion, DispatchError> {
    let limit = Duration::from_secs(timeout_secs);
    let completion = tokio::time::timeout(limit, backend.complete(request))
        .await
        .map_err(|_| DispatchError::Timeout { secs: timeout_secs })??;
    Ok(completion)
}

/// System prompt, optional context block, then the formatted input.
pub fn build_messages(config: &RoleConfig, request: &TaskRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(config.system_prompt)];

    if let Some(context) = request.context.as_ref().filter(|c| !c.is_empty()) {
        messages.push(ChatMessage::user(format!(
            "Context: {}",
            Value::Object(context.clone())
        )));
    }

    messages.push(ChatMessage::user(format_input(&request.input_data)));
    messages
}

/// Mappings become `key: value` lines; anything else is converted directly.
pub fn format_input(input: &Value) -> String {
    match input {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{key}: {}", display_value(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => display_value(other),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn timestamp() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn extend(target: &mut Map<String, Value>, fields: Value) {
    if let Value::Object(fields) = fields {
        target.extend(fields);
    }
}

/// Envelope shape for a live completion. Nothing is extracted from `content`.
fn shaped_result(role: AgentRole, content: &str) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("content".to_string(), Value::String(content.to_string()));
    result.insert("agent_role".to_string(), Value::String(role.to_string()));
    result.insert("timestamp".to_string(), timestamp());

    let fields = match role {
        AgentRole::Coordinator => json!({
            "task_assignments": [],
            "workflow_steps": [],
            "priority_order": [],
            "estimated_completion": null,
        }),
        AgentRole::Analyst => json!({
            "insights": [],
            "patterns": [],
            "recommendations": [],
            "confidence_score": 0.0,
        }),
        AgentRole::Generator => json!({
            "generated_content": content,
            "content_type": "text",
            "quality_metrics": {},
            "alternatives": [],
        }),
        AgentRole::Validator => json!({
            "validation_status": "pending",
            "compliance_checks": [],
            "quality_score": 0.0,
            "issues_found": [],
            "approved": false,
        }),
    };
    extend(&mut result, fields);
    result
}

/// Canned degraded-mode data. Always tagged `simulated: true`.
fn simulated_result(role: AgentRole) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("agent_role".to_string(), Value::String(role.to_string()));
    result.insert("timestamp".to_string(), timestamp());
    result.insert("simulated".to_string(), Value::Bool(true));

    let fields = match role {
        AgentRole::Coordinator => json!({
            "content": "Task coordination completed. Distributing work to specialist agents.",
            "task_assignments": ["analyst", "generator", "validator"],
            "workflow_steps": ["analyze", "generate", "validate"],
            "priority_order": [1, 2, 3],
        }),
        AgentRole::Analyst => json!({
            "content": "Analysis completed. Key patterns and insights identified.",
            "insights": ["Pattern A detected", "Trend B identified"],
            "confidence_score": 0.85,
        }),
        AgentRole::Generator => json!({
            "content": "Content generation completed successfully.",
            "generated_content": "High-quality output generated based on analysis",
            "content_type": "text",
        }),
        AgentRole::Validator => json!({
            "content": "Validation completed. Quality standards met.",
            "validation_status": "passed",
            "quality_score": 0.92,
            "approved": true,
        }),
    };
    extend(&mut result, fields);
    result
}

fn simulated_metadata(config: &RoleConfig) -> Map<String, Value> {
    let mut metadata = Map::new();
    extend(
        &mut metadata,
        json!({
            "model": "simulation",
            "capabilities": config.capabilities,
        }),
    );
    metadata
}

fn success_metadata(config: &RoleConfig, tokens_used: u64) -> Map<String, Value> {
    let mut metadata = Map::new();
    extend(
        &mut metadata,
        json!({
            "model": config.model,
            "temperature": config.temperature,
            "tokens_used": tokens_used,
            "capabilities": config.capabilities,
        }),
    );
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_input_flattens_mapping_into_lines() {
        let input = json!({"topic": "EU expansion", "year": 2025, "tags": ["a", "b"]});
        let formatted = format_input(&input);
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(
            lines,
            vec!["tags: [\"a\",\"b\"]", "topic: EU expansion", "year: 2025"]
        );
    }

    #[test]
    fn test_format_input_non_mapping_is_stringified() {
        assert_eq!(format_input(&json!("raw text")), "raw text");
        assert_eq!(format_input(&json!(42)), "42");
        assert_eq!(format_input(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_build_messages_orders_system_context_input() {
        let registry = RoleRegistry::standard();
        let mut context = Map::new();
        context.insert("plan".to_string(), json!("do it"));
        let request = TaskRequest::new("t1", AgentRole::Analyst, json!({"q": "why"}))
            .with_context(context);

        let messages = build_messages(registry.get(AgentRole::Analyst), &request);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("Analysis Agent"));
        assert_eq!(messages[1].content, "Context: {\"plan\":\"do it\"}");
        assert_eq!(messages[2].content, "q: why");
    }

    #[test]
    fn test_build_messages_skips_empty_context() {
        let registry = RoleRegistry::standard();
        let request =
            TaskRequest::new("t1", AgentRole::Generator, json!({})).with_context(Map::new());
        let messages = build_messages(registry.get(AgentRole::Generator), &request);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_generator_shape_echoes_content() {
        let result = shaped_result(AgentRole::Generator, "draft");
        assert_eq!(result["generated_content"], "draft");
        assert_eq!(result["content"], "draft");
        assert_eq!(result["content_type"], "text");
    }

    #[test]
    fn test_validator_shape_is_fixed_regardless_of_content() {
        let result = shaped_result(AgentRole::Validator, "Everything passed, approved!");
        assert_eq!(result["validation_status"], "pending");
        assert_eq!(result["approved"], false);
        assert_eq!(result["quality_score"], 0.0);
    }

    #[test]
    fn test_task_request_deserialize_defaults() {
        let request: TaskRequest =
            serde_json::from_str(r#"{"task_id":"t","role":"analyst"}"#).unwrap();
        assert_eq!(request.priority, 1);
        assert_eq!(request.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(request.input_data, json!({}));
        assert!(request.context.is_none());
    }

    #[test]
    fn test_task_request_unknown_role_rejected() {
        let result: Result<TaskRequest, _> =
            serde_json::from_str(r#"{"task_id":"t","role":"planner"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_success_metadata_reports_configured_temperature_exactly() {
        let config = RoleConfig::standard(AgentRole::Coordinator);
        let metadata = success_metadata(&config, 12);
        assert_eq!(metadata["temperature"], json!(0.3));
        assert_eq!(metadata["tokens_used"], 12);
    }

    #[test]
    fn test_deserialized_envelope_round_trips_when_consistent() {
        let request = TaskRequest::new("t", AgentRole::Analyst, json!({}));
        let original = TaskResponse::failed(&request, "boom".to_string(), 0.25);
        let json = serde_json::to_value(&original).unwrap();
        let parsed: TaskResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_deserialize_rejects_error_status_without_message() {
        let result: Result<TaskResponse, _> = serde_json::from_value(json!({
            "task_id": "t",
            "role": "analyst",
            "status": "error",
            "result": {"a": 1},
            "metadata": {},
            "execution_time": 0.1,
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("error status without an error message"), "got: {err}");
    }

    #[test]
    fn test_deserialize_rejects_error_with_result_payload() {
        let result: Result<TaskResponse, _> = serde_json::from_value(json!({
            "task_id": "t",
            "role": "analyst",
            "status": "error",
            "result": {"a": 1},
            "error": "boom",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_error_message_on_success() {
        let result: Result<TaskResponse, _> = serde_json::from_value(json!({
            "task_id": "t",
            "role": "generator",
            "status": "success",
            "error": "boom",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_envelope_upholds_invariant() {
        let request = TaskRequest::new("t", AgentRole::Coordinator, json!({}));
        let response = TaskResponse::failed(&request, "boom".to_string(), 0.5);
        assert_eq!(response.status(), TaskStatus::Error);
        assert!(response.result().is_empty());
        assert!(response.metadata().is_empty());
        assert_eq!(response.error(), Some("boom"));
        assert!(!response.is_ok());
    }
}
