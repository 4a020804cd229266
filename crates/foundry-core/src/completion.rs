//! Chat-completion backend seam and the HTTP implementation.
//!
//! [`CompletionBackend`] is the only way the dispatcher talks to a model.
//! [`HttpCompletionBackend`] speaks the OpenAI chat-completions wire format
//! against either Azure OpenAI or the public OpenAI API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CompletionEndpoint;
use crate::error::ConfigError;

/// Completion backend errors.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("completion response contained no choices")]
    EmptyResponse,

    /// For [`CompletionBackend`] implementations outside this crate that
    /// cannot reach their service. The HTTP backend reports transport
    /// failures as [`CompletionError::Http`] instead.
    #[error("completion backend unavailable: {0}")]
    Unavailable(String),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Generated text plus token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u64,
}

/// External text-completion capability.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Provider name for logs and health reports.
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Completion>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

/// reqwest-based backend for Azure OpenAI and OpenAI.
pub struct HttpCompletionBackend {
    client: Client,
    endpoint: CompletionEndpoint,
}

impl HttpCompletionBackend {
    pub fn new(endpoint: CompletionEndpoint) -> Result<Self, ConfigError> {
        let base = match &endpoint {
            CompletionEndpoint::Azure { endpoint, .. } => ("AZURE_OPENAI_ENDPOINT", endpoint),
            CompletionEndpoint::OpenAi { base_url, .. } => ("OPENAI_BASE_URL", base_url),
        };
        reqwest::Url::parse(base.1).map_err(|e| ConfigError::InvalidValue {
            var: base.0.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(concat!("foundry-core/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    fn url_for(&self, model: &str) -> String {
        match &self.endpoint {
            CompletionEndpoint::Azure {
                endpoint,
                api_version,
                ..
            } => format!(
                "{endpoint}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
            CompletionEndpoint::OpenAi { base_url, .. } => {
                format!("{base_url}/chat/completions")
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    fn name(&self) -> &str {
        self.endpoint.provider()
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> CompletionResult<Completion> {
        debug!(provider = self.name(), "sending chat completion request");

        // Azure routes by deployment in the URL; OpenAI routes by body field.
        let (builder, model) = match &self.endpoint {
            CompletionEndpoint::Azure { api_key, .. } => (
                self.client
                    .post(self.url_for(&request.model))
                    .header("api-key", api_key),
                None,
            ),
            CompletionEndpoint::OpenAi { api_key, .. } => (
                self.client
                    .post(self.url_for(&request.model))
                    .bearer_auth(api_key),
                Some(request.model.as_str()),
            ),
        };

        let body = ChatCompletionBody {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = builder
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(CompletionError::EmptyResponse)?
            .message
            .content
            .unwrap_or_default();

        Ok(Completion {
            content,
            total_tokens: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn azure() -> CompletionEndpoint {
        CompletionEndpoint::Azure {
            endpoint: "https://res.openai.azure.com".to_string(),
            api_key: "k".to_string(),
            api_version: "2024-02-15-preview".to_string(),
        }
    }

    #[test]
    fn test_azure_url_routes_by_deployment() {
        let backend = HttpCompletionBackend::new(azure()).unwrap();
        assert_eq!(
            backend.url_for("gpt-4"),
            "https://res.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-15-preview"
        );
        assert_eq!(backend.name(), "azure_openai");
    }

    #[test]
    fn test_openai_url_is_model_independent() {
        let backend = HttpCompletionBackend::new(CompletionEndpoint::OpenAi {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: "sk".to_string(),
        })
        .unwrap();
        assert_eq!(
            backend.url_for("gpt-4"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let result = HttpCompletionBackend::new(CompletionEndpoint::OpenAi {
            base_url: "not a url".to_string(),
            api_key: "sk".to_string(),
        });
        match result {
            Err(ConfigError::InvalidValue { var, .. }) => assert_eq!(var, "OPENAI_BASE_URL"),
            Err(other) => panic!("Expected InvalidValue, got {:?}", other),
            Ok(_) => panic!("Expected InvalidValue, got a backend"),
        }
    }

    #[test]
    fn test_body_omits_model_for_azure() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionBody {
            model: None,
            messages: &messages,
            temperature: 0.5,
            max_tokens: 10,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 10);
    }

    #[test]
    fn test_unavailable_display_carries_reason() {
        let err = CompletionError::Unavailable("circuit open".to_string());
        assert_eq!(err.to_string(), "completion backend unavailable: circuit open");
    }

    #[test]
    fn test_response_without_usage_parses() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.usage.is_none());
    }
}
