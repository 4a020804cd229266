//! Role vocabulary and the static role registry: `AgentRole`, `RoleConfig`, `RoleRegistry`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RoleError, RoleResult};

/// Default model for every role unless the registry is re-targeted.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// The four agent personas of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Coordinator,
    Analyst,
    Generator,
    Validator,
}

impl AgentRole {
    /// All roles in pipeline order.
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Coordinator,
        AgentRole::Analyst,
        AgentRole::Generator,
        AgentRole::Validator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Coordinator => "coordinator",
            AgentRole::Analyst => "analyst",
            AgentRole::Generator => "generator",
            AgentRole::Validator => "validator",
        }
    }

    fn index(self) -> usize {
        match self {
            AgentRole::Coordinator => 0,
            AgentRole::Analyst => 1,
            AgentRole::Generator => 2,
            AgentRole::Validator => 3,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = RoleError;

    fn from_str(s: &str) -> RoleResult<Self> {
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RoleError::UnknownRole(s.to_string()))
    }
}

/// Static configuration for one role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleConfig {
    pub role: AgentRole,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: &'static str,
    pub capabilities: &'static [&'static str],
}

impl RoleConfig {
    /// Built-in configuration for `role`.
    pub fn standard(role: AgentRole) -> Self {
        let (temperature, max_tokens, system_prompt, capabilities): (
            f64,
            u32,
            &'static str,
            &'static [&'static str],
        ) = match role {
            AgentRole::Coordinator => (
                0.3,
                1500,
                "You are the Coordinator Agent in a multiagent AI system. \
                 Your role is to orchestrate tasks between specialist agents, manage workflow, \
                 and ensure optimal task distribution. You make strategic decisions about \
                 which agents to involve and how to sequence their work.",
                &[
                    "task_orchestration",
                    "workflow_management",
                    "decision_making",
                ],
            ),
            AgentRole::Analyst => (
                0.2,
                2000,
                "You are the Analysis Agent specialized in data analysis, \
                 pattern recognition, and insight extraction. You process complex data, \
                 identify trends, and provide analytical insights to support decision-making.",
                &[
                    "data_analysis",
                    "pattern_recognition",
                    "insight_extraction",
                ],
            ),
            AgentRole::Generator => (
                0.8,
                2500,
                "You are the Generation Agent specialized in content creation, \
                 solution generation, and creative problem-solving. You create high-quality \
                 outputs based on analysis and requirements.",
                &[
                    "content_generation",
                    "solution_design",
                    "creative_thinking",
                ],
            ),
            AgentRole::Validator => (
                0.1,
                1000,
                "You are the Validation Agent responsible for quality assurance, \
                 compliance checking, and result validation. You ensure outputs meet standards \
                 and requirements before final delivery.",
                &["quality_assurance", "compliance_checking", "validation"],
            ),
        };

        Self {
            role,
            model: DEFAULT_MODEL.to_string(),
            temperature,
            max_tokens,
            system_prompt,
            capabilities,
        }
    }
}

/// Read-only map from role to its configuration.
///
/// Holds exactly one config per [`AgentRole`], so [`RoleRegistry::get`] is
/// infallible. Name-based lookups go through [`RoleRegistry::lookup`].
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    configs: [RoleConfig; 4],
}

impl RoleRegistry {
    /// Registry with the built-in config for every role.
    pub fn standard() -> Self {
        Self {
            configs: AgentRole::ALL.map(RoleConfig::standard),
        }
    }

    /// Point every role at `model` (e.g. an Azure deployment name).
    pub fn with_model(mut self, model: &str) -> Self {
        for config in &mut self.configs {
            config.model = model.to_string();
        }
        self
    }

    pub fn get(&self, role: AgentRole) -> &RoleConfig {
        &self.configs[role.index()]
    }

    /// Look up a role by its wire name.
    pub fn lookup(&self, name: &str) -> RoleResult<&RoleConfig> {
        let role: AgentRole = name.parse()?;
        Ok(self.get(role))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleConfig> {
        self.configs.iter()
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
