//! Foundry Core Library
//!
//! Role registry, task dispatch and the fixed coordinator → analyst →
//! generator → validator workflow, over a pluggable chat-completion backend.

pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod obs;
pub mod roles;
pub mod telemetry;
pub mod workflow;

pub use completion::{
    ChatMessage, Completion, CompletionBackend, CompletionError, CompletionRequest,
    CompletionResult, HttpCompletionBackend,
};
pub use config::{CompletionEndpoint, FoundryConfig, WorkspaceConfig};
pub use dispatch::{TaskDispatcher, TaskRequest, TaskResponse, TaskStatus, DEFAULT_TIMEOUT_SECS};
pub use error::{ConfigError, DispatchError, RoleError, RoleResult, WorkflowError};
pub use health::{health_check, HealthReport, OverallStatus, ServiceHealth};
pub use roles::{AgentRole, RoleConfig, RoleRegistry};
pub use telemetry::init_tracing;
pub use workflow::{WorkflowResult, WorkflowRunner, WorkflowSpec, WorkflowStatus};
