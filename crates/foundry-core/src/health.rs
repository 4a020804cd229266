//! Service health reporting.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::completion::{ChatMessage, CompletionRequest};
use crate::config::FoundryConfig;
use crate::dispatch::TaskDispatcher;
use crate::roles::AgentRole;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// State of one downstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy,
    NotConfigured,
    Unhealthy(String),
}

impl std::fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceHealth::Healthy => write!(f, "healthy"),
            ServiceHealth::NotConfigured => write!(f, "not_configured"),
            ServiceHealth::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

impl Serialize for ServiceHealth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, ServiceHealth>,
    pub overall_status: OverallStatus,
    pub unhealthy_services: Vec<String>,
}

impl HealthReport {
    fn from_services(services: BTreeMap<String, ServiceHealth>) -> Self {
        let unhealthy_services: Vec<String> = services
            .iter()
            .filter(|(_, health)| matches!(health, ServiceHealth::Unhealthy(_)))
            .map(|(name, _)| name.clone())
            .collect();

        let overall_status = if unhealthy_services.is_empty() {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };

        Self {
            timestamp: Utc::now(),
            services,
            overall_status,
            unhealthy_services,
        }
    }
}

/// Probe the completion backend and report configuration of the rest.
///
/// The probe is a ten-token completion against the coordinator's model.
pub async fn health_check(dispatcher: &TaskDispatcher, config: &FoundryConfig) -> HealthReport {
    let completion = match dispatcher.backend() {
        None => ServiceHealth::NotConfigured,
        Some(backend) => {
            let probe = CompletionRequest {
                model: dispatcher.registry().get(AgentRole::Coordinator).model.clone(),
                messages: vec![ChatMessage::user("Health check")],
                temperature: 0.0,
                max_tokens: 10,
                timeout: PROBE_TIMEOUT,
            };
            match tokio::time::timeout(PROBE_TIMEOUT, backend.complete(probe)).await {
                Ok(Ok(_)) => ServiceHealth::Healthy,
                Ok(Err(e)) => ServiceHealth::Unhealthy(e.to_string()),
                Err(_) => ServiceHealth::Unhealthy("probe timed out".to_string()),
            }
        }
    };

    let configured = |present: bool| {
        if present {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::NotConfigured
        }
    };

    let mut services = BTreeMap::new();
    services.insert("completion".to_string(), completion);
    services.insert(
        "ml_workspace".to_string(),
        configured(config.workspace.is_configured()),
    );
    services.insert(
        "text_analytics".to_string(),
        configured(config.text_analytics_endpoint.is_some()),
    );

    HealthReport::from_services(services)
}
