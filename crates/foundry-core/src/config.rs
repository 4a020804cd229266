//! Environment-driven configuration.
//!
//! Credentials pick the completion endpoint: Azure OpenAI first, then the
//! public OpenAI API. With neither set, the dispatcher runs in simulated mode.

use serde::Serialize;

/// Azure OpenAI API version used when `AZURE_OPENAI_API_VERSION` is unset.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// OpenAI base URL used when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Where chat completions are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEndpoint {
    Azure {
        endpoint: String,
        api_key: String,
        api_version: String,
    },
    OpenAi {
        base_url: String,
        api_key: String,
    },
}

impl CompletionEndpoint {
    pub fn provider(&self) -> &'static str {
        match self {
            CompletionEndpoint::Azure { .. } => "azure_openai",
            CompletionEndpoint::OpenAi { .. } => "openai",
        }
    }
}

/// Azure ML workspace coordinates. Only their presence is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceConfig {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub workspace_name: Option<String>,
}

impl WorkspaceConfig {
    pub fn is_configured(&self) -> bool {
        self.subscription_id.is_some()
            && self.resource_group.is_some()
            && self.workspace_name.is_some()
    }
}

/// Process-wide configuration, built once at startup and passed down.
#[derive(Debug, Clone, Default)]
pub struct FoundryConfig {
    /// `None` selects simulated mode.
    pub completion: Option<CompletionEndpoint>,
    /// Model or deployment name applied to every role.
    pub model_override: Option<String>,
    pub workspace: WorkspaceConfig,
    pub text_analytics_endpoint: Option<String>,
}

impl FoundryConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let completion = match (var("AZURE_OPENAI_ENDPOINT"), var("AZURE_OPENAI_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Some(CompletionEndpoint::Azure {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key,
                api_version: var("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            }),
            _ => var("OPENAI_API_KEY").map(|api_key| CompletionEndpoint::OpenAi {
                base_url: var("OPENAI_BASE_URL")
                    .map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_key,
            }),
        };

        Self {
            completion,
            model_override: var("FOUNDRY_MODEL"),
            workspace: WorkspaceConfig {
                subscription_id: var("AZURE_SUBSCRIPTION_ID"),
                resource_group: var("AZURE_RESOURCE_GROUP"),
                workspace_name: var("AZURE_ML_WORKSPACE_NAME"),
            },
            text_analytics_endpoint: var("AZURE_TEXT_ANALYTICS_ENDPOINT"),
        }
    }

    /// Configuration with no credentials at all.
    pub fn simulated() -> Self {
        Self::default()
    }

    pub fn is_simulated(&self) -> bool {
        self.completion.is_none()
    }
}
