//! Foundry - multi-agent orchestrator CLI
//!
//! The `foundry` command drives the coordinator, analyst, generator and
//! validator agents from the terminal.
//!
//! ## Commands
//!
//! - `run`: Run the four-stage workflow from a spec file or flags
//! - `dispatch`: Send one task to a single agent
//! - `health`: Report backend and service health
//! - `demo`: Walk through the scripted demo scenarios

mod demo;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use foundry_core::{
    health_check, AgentRole, FoundryConfig, TaskDispatcher, TaskRequest, WorkflowRunner,
    WorkflowSpec, WorkflowStatus, DEFAULT_TIMEOUT_SECS,
};
use serde_json::Value;
use tracing::{info, Level};

use demo::{DemoRunner, ScenarioSelector};

#[derive(Parser)]
#[command(name = "foundry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-agent orchestrator (coordinator, analyst, generator, validator)", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator -> analyst -> generator -> validator workflow
    Run {
        /// Workflow spec file (JSON)
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Override the spec's workflow id
        #[arg(long)]
        workflow_id: Option<String>,

        /// Skip the analysis stage
        #[arg(long)]
        skip_analysis: bool,

        /// Skip the generation stage
        #[arg(long)]
        skip_generation: bool,

        /// Skip the validation stage
        #[arg(long)]
        skip_validation: bool,
    },

    /// Send a single task to one agent
    Dispatch {
        /// Agent role: coordinator, analyst, generator or validator
        #[arg(short, long)]
        role: String,

        /// Task input; parsed as JSON, or sent as a plain string if it isn't
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Task id reported back in the response
        #[arg(long, default_value = "cli_task")]
        task_id: String,

        /// Completion timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Check completion backend and service configuration
    Health,

    /// Run the scripted demo scenarios
    Demo {
        /// Scenario to run: 1, 2, 3 or all
        #[arg(short, long, value_enum, default_value = "all")]
        scenario: ScenarioSelector,

        /// Wait for ENTER before each scenario
        #[arg(long)]
        interactive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    foundry_core::init_tracing(cli.json, level);

    let config = FoundryConfig::from_env();
    let dispatcher =
        TaskDispatcher::from_config(&config).context("Failed to configure completion backend")?;

    match cli.command {
        Commands::Run {
            spec,
            workflow_id,
            skip_analysis,
            skip_generation,
            skip_validation,
        } => {
            let spec = load_spec(
                spec.as_deref(),
                workflow_id,
                StageSkips {
                    analysis: skip_analysis,
                    generation: skip_generation,
                    validation: skip_validation,
                },
            )?;
            cmd_run(dispatcher, spec).await
        }
        Commands::Dispatch {
            role,
            input,
            task_id,
            timeout,
        } => cmd_dispatch(&dispatcher, &role, &input, &task_id, timeout).await,
        Commands::Health => cmd_health(&dispatcher, &config).await,
        Commands::Demo {
            scenario,
            interactive,
        } => cmd_demo(&dispatcher, scenario, interactive).await,
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StageSkips {
    analysis: bool,
    generation: bool,
    validation: bool,
}

/// Build a workflow spec from an optional file plus command-line overrides.
fn load_spec(
    path: Option<&Path>,
    workflow_id: Option<String>,
    skips: StageSkips,
) -> Result<WorkflowSpec> {
    let mut spec = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read spec file: {:?}", path))?;
            serde_json::from_str::<WorkflowSpec>(&content)
                .context("Failed to parse workflow spec as JSON")?
        }
        None => WorkflowSpec::default(),
    };

    if let Some(id) = workflow_id {
        spec.workflow_id = id;
    }
    spec.require_analysis &= !skips.analysis;
    spec.require_generation &= !skips.generation;
    spec.require_validation &= !skips.validation;
    Ok(spec)
}

/// Parse task input as JSON, falling back to a plain string.
fn parse_input(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

async fn cmd_run(dispatcher: TaskDispatcher, spec: WorkflowSpec) -> Result<()> {
    info!("Running workflow {}", spec.workflow_id);
    let runner = WorkflowRunner::new(Arc::new(dispatcher));
    let result = runner.run_workflow(spec).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.status == WorkflowStatus::Failed {
        bail!(
            "workflow {} failed: {}",
            result.workflow_id,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn cmd_dispatch(
    dispatcher: &TaskDispatcher,
    role: &str,
    input: &str,
    task_id: &str,
    timeout: u64,
) -> Result<()> {
    let role = AgentRole::from_str(role)?;
    let request = TaskRequest::new(task_id, role, parse_input(input)).with_timeout_secs(timeout);
    let response = dispatcher.dispatch(request).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(error) = response.error() {
        bail!("task {} failed: {}", response.task_id(), error);
    }
    Ok(())
}

async fn cmd_health(dispatcher: &TaskDispatcher, config: &FoundryConfig) -> Result<()> {
    let report = health_check(dispatcher, config).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_demo(
    dispatcher: &TaskDispatcher,
    scenario: ScenarioSelector,
    interactive: bool,
) -> Result<()> {
    let stdout = std::io::stdout();
    let summary = DemoRunner::new(dispatcher, stdout.lock(), interactive)
        .run(scenario)
        .await?;
    info!(
        session_id = %summary.session_id,
        total_requests = summary.metrics.total_requests,
        "demo finished"
    );
    Ok(())
}
