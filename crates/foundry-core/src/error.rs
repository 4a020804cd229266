//! Error taxonomy for roles, configuration, dispatch and workflows.

use crate::completion::CompletionError;
use crate::roles::AgentRole;

/// Errors produced by the role registry.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("unknown agent role: {0}")]
    UnknownRole(String),
}

/// Result type for role lookups.
pub type RoleResult<T> = std::result::Result<T, RoleError>;

/// Configuration errors.
///
/// Missing credentials are not an error: they select simulated mode.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised while a single task is in flight.
///
/// These never escape [`crate::dispatch::TaskDispatcher::dispatch`]; they are
/// folded into an `error` response envelope.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("completion request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("invalid response envelope for task {task_id}: {reason}")]
    InvalidEnvelope {
        task_id: String,
        reason: &'static str,
    },
}

/// Errors that abort a whole workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Coordinator failed: {0}")]
    CoordinatorFailed(String),

    #[error("cannot fold {key} into {role} input: stage input must be a mapping")]
    StageInputNotMapping { role: AgentRole, key: &'static str },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for workflow stage execution.
pub type StageResult<T> = std::result::Result<T, WorkflowError>;
