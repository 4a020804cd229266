//! Console demo: three scripted scenarios driven through the real dispatcher.
//!
//! With no credentials configured every dispatch is simulated, so the demo
//! runs offline. Reported numbers come from the responses themselves.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use foundry_core::{AgentRole, TaskDispatcher, TaskRequest, TaskResponse};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

const RULE: &str =
    "================================================================================";

/// Which scenarios to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioSelector {
    #[value(name = "1")]
    DocumentAnalysis,
    #[value(name = "2")]
    BusinessAssistant,
    #[value(name = "3")]
    ProcessAutomation,
    All,
}

impl ScenarioSelector {
    fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioSelector::DocumentAnalysis => vec![Scenario::DocumentAnalysis],
            ScenarioSelector::BusinessAssistant => vec![Scenario::BusinessAssistant],
            ScenarioSelector::ProcessAutomation => vec![Scenario::ProcessAutomation],
            ScenarioSelector::All => vec![
                Scenario::DocumentAnalysis,
                Scenario::BusinessAssistant,
                Scenario::ProcessAutomation,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    DocumentAnalysis,
    BusinessAssistant,
    ProcessAutomation,
}

impl Scenario {
    fn title(self) -> &'static str {
        match self {
            Scenario::DocumentAnalysis => "Scenario 1: Intelligent document analysis",
            Scenario::BusinessAssistant => "Scenario 2: Business decision assistant",
            Scenario::ProcessAutomation => "Scenario 3: Complex process automation",
        }
    }
}

/// Counters accumulated across a demo session.
#[derive(Debug, Clone, Default)]
pub struct DemoMetrics {
    pub total_requests: u64,
    pub successful_operations: u64,
    pub tokens_used: u64,
    pub total_execution_time: f64,
    pub agents_activated: BTreeMap<AgentRole, u64>,
}

impl DemoMetrics {
    fn record(&mut self, response: &TaskResponse) {
        self.total_requests += 1;
        if response.is_ok() {
            self.successful_operations += 1;
        }
        self.tokens_used += response
            .metadata()
            .get("tokens_used")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        self.total_execution_time += response.execution_time();
        *self.agents_activated.entry(response.role()).or_default() += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_operations as f64 * 100.0 / self.total_requests as f64
    }

    pub fn avg_response_time(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.total_execution_time / self.total_requests as f64
    }
}

/// End-of-session record.
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub scenarios_completed: Vec<Scenario>,
    pub metrics: DemoMetrics,
}

/// Runs demo scenarios and writes the transcript to `out`.
///
/// In interactive mode each scenario waits for a line on `input`. The reader
/// lives as long as the runner, so lines typed ahead are kept.
pub struct DemoRunner<'a, W: Write, R = BufReader<Stdin>> {
    dispatcher: &'a TaskDispatcher,
    out: W,
    input: Option<R>,
    summary: DemoSummary,
}

impl<'a, W: Write> DemoRunner<'a, W> {
    pub fn new(dispatcher: &'a TaskDispatcher, out: W, interactive: bool) -> Self {
        let input = interactive.then(|| BufReader::new(tokio::io::stdin()));
        Self::with_input(dispatcher, out, input)
    }
}

impl<'a, W: Write, R: AsyncBufRead + Unpin> DemoRunner<'a, W, R> {
    /// `None` runs without pauses.
    pub fn with_input(dispatcher: &'a TaskDispatcher, out: W, input: Option<R>) -> Self {
        let start_time = Utc::now();
        Self {
            dispatcher,
            out,
            input,
            summary: DemoSummary {
                session_id: format!("demo_{}", start_time.timestamp()),
                start_time,
                scenarios_completed: Vec::new(),
                metrics: DemoMetrics::default(),
            },
        }
    }

    pub async fn run(mut self, selector: ScenarioSelector) -> Result<DemoSummary> {
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Multi-agent orchestration demo")?;
        writeln!(
            self.out,
            "Mode: {}",
            if self.dispatcher.is_simulated() {
                "simulated (no completion credentials configured)"
            } else {
                "live"
            }
        )?;
        writeln!(self.out, "{RULE}")?;

        for scenario in selector.scenarios() {
            match scenario {
                Scenario::DocumentAnalysis => self.document_analysis().await?,
                Scenario::BusinessAssistant => self.business_assistant().await?,
                Scenario::ProcessAutomation => self.process_automation().await?,
            }
            self.summary.scenarios_completed.push(scenario);
        }

        if selector == ScenarioSelector::All {
            self.print_metrics()?;
        }
        self.print_final_summary()?;
        Ok(self.summary)
    }

    async fn document_analysis(&mut self) -> Result<()> {
        let scenario = Scenario::DocumentAnalysis;
        self.heading(scenario)?;
        writeln!(
            self.out,
            "Flow: analyst extracts -> generator summarises -> validator checks"
        )?;
        self.pause("Press ENTER to start the document analysis...")
            .await?;

        let document = json!({
            "document": "Financial_Report_Q3_2024.pdf",
            "task": "Extract text, tables, charts and metadata from the document",
        });
        let analysis = self
            .step(TaskRequest::new("doc_analyst", AgentRole::Analyst, document))
            .await?;

        let mut generation = Map::new();
        generation.insert(
            "task".to_string(),
            json!("Create an executive summary and strategic insights"),
        );
        generation.insert(
            "analysis_results".to_string(),
            Value::Object(analysis.result().clone()),
        );
        let summary = self
            .step(TaskRequest::new(
                "doc_generator",
                AgentRole::Generator,
                Value::Object(generation),
            ))
            .await?;

        let mut validation = Map::new();
        validation.insert(
            "task".to_string(),
            json!("Verify accuracy, compliance and quality of the insights"),
        );
        validation.insert(
            "content_to_validate".to_string(),
            Value::Object(summary.result().clone()),
        );
        self.step(TaskRequest::new(
            "doc_validator",
            AgentRole::Validator,
            Value::Object(validation),
        ))
        .await?;

        writeln!(self.out, "{} completed.", scenario.title())?;
        Ok(())
    }

    async fn business_assistant(&mut self) -> Result<()> {
        let scenario = Scenario::BusinessAssistant;
        self.heading(scenario)?;
        let question = "Should we expand into the European market in 2025?";
        writeln!(self.out, "Strategic question: {question}")?;
        self.pause("Press ENTER to ask the strategic question...")
            .await?;

        let plan = self
            .step(TaskRequest::new(
                "biz_coordinator",
                AgentRole::Coordinator,
                json!({"question": question, "task": "Split the question into specialist analyses"}),
            ))
            .await?;

        writeln!(self.out, "Running specialist analyses in parallel...")?;
        let context = plan.result().clone();
        self.parallel(vec![
            TaskRequest::new(
                "biz_market",
                AgentRole::Analyst,
                json!({"task": "European market analysis"}),
            )
            .with_context(context.clone()),
            TaskRequest::new(
                "biz_projections",
                AgentRole::Generator,
                json!({"task": "Financial projections for the expansion"}),
            )
            .with_context(context.clone()),
            TaskRequest::new(
                "biz_risks",
                AgentRole::Validator,
                json!({"task": "Regulatory risk assessment"}),
            )
            .with_context(context.clone()),
        ])
        .await?;

        self.step(
            TaskRequest::new(
                "biz_synthesis",
                AgentRole::Coordinator,
                json!({"task": "Final synthesis and strategic recommendation", "question": question}),
            )
            .with_context(context),
        )
        .await?;

        writeln!(self.out, "{} completed.", scenario.title())?;
        Ok(())
    }

    async fn process_automation(&mut self) -> Result<()> {
        let scenario = Scenario::ProcessAutomation;
        self.heading(scenario)?;
        writeln!(
            self.out,
            "Trigger: automatic contract approval for Supplier_Contract_XYZ_2024.pdf"
        )?;
        self.pause("Press ENTER to simulate the automatic trigger...")
            .await?;

        writeln!(self.out, "Starting parallel processing...")?;
        let results = self
            .parallel(vec![
                TaskRequest::new(
                    "proc_legal",
                    AgentRole::Analyst,
                    json!({"task": "Legal and compliance analysis"}),
                ),
                TaskRequest::new(
                    "proc_extraction",
                    AgentRole::Generator,
                    json!({"task": "Extract clauses and terms"}),
                ),
                TaskRequest::new(
                    "proc_signatures",
                    AgentRole::Validator,
                    json!({"task": "Verify signatures and authenticity"}),
                ),
            ])
            .await?;

        let mut findings = Map::new();
        for response in &results {
            findings.insert(
                response.role().to_string(),
                Value::Object(response.result().clone()),
            );
        }
        self.step(TaskRequest::new(
            "proc_decision",
            AgentRole::Coordinator,
            json!({"task": "Final approval decision based on criteria", "findings": findings}),
        ))
        .await?;

        writeln!(self.out, "{} completed.", scenario.title())?;
        Ok(())
    }

    async fn step(&mut self, request: TaskRequest) -> Result<TaskResponse> {
        let response = self.dispatcher.dispatch(request).await;
        self.report(&response)?;
        Ok(response)
    }

    async fn parallel(&mut self, requests: Vec<TaskRequest>) -> Result<Vec<TaskResponse>> {
        let responses = self.dispatcher.dispatch_all(requests).await;
        for response in &responses {
            self.report(response)?;
        }
        Ok(responses)
    }

    fn report(&mut self, response: &TaskResponse) -> Result<()> {
        self.summary.metrics.record(response);
        writeln!(
            self.out,
            "[{}] {} -> {} ({:.2}s)",
            response.role(),
            response.task_id(),
            response.status(),
            response.execution_time()
        )?;
        match response.error() {
            Some(error) => writeln!(self.out, "    error: {error}")?,
            None => {
                if let Some(content) = response.result().get("content").and_then(Value::as_str) {
                    writeln!(self.out, "    {}", excerpt(content, 160))?;
                }
            }
        }
        Ok(())
    }

    fn heading(&mut self, scenario: Scenario) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "{}", scenario.title())?;
        writeln!(self.out, "{RULE}")?;
        Ok(())
    }

    async fn pause(&mut self, message: &str) -> Result<()> {
        let Some(input) = self.input.as_mut() else {
            return Ok(());
        };
        writeln!(self.out, "{message}")?;
        self.out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            self.input = None;
            writeln!(self.out, "End of input, continuing without pauses.")?;
        }
        Ok(())
    }

    fn print_metrics(&mut self) -> Result<()> {
        let metrics = &self.summary.metrics;
        writeln!(self.out)?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Session metrics")?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Total requests:        {}", metrics.total_requests)?;
        writeln!(
            self.out,
            "Successful operations: {}",
            metrics.successful_operations
        )?;
        writeln!(self.out, "Success rate:          {:.1}%", metrics.success_rate())?;
        writeln!(
            self.out,
            "Avg response time:     {:.3}s",
            metrics.avg_response_time()
        )?;
        writeln!(self.out, "Tokens used:           {}", metrics.tokens_used)?;
        for (role, count) in &metrics.agents_activated {
            writeln!(self.out, "  {role:<12} {count} executions")?;
        }
        Ok(())
    }

    fn print_final_summary(&mut self) -> Result<()> {
        let duration = (Utc::now() - self.summary.start_time).num_milliseconds() as f64 / 1000.0;
        writeln!(self.out)?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Demo finished")?;
        writeln!(self.out, "{RULE}")?;
        writeln!(self.out, "Session ID:       {}", self.summary.session_id)?;
        writeln!(self.out, "Duration:         {duration:.1}s")?;
        writeln!(
            self.out,
            "Scenarios run:    {}",
            self.summary.scenarios_completed.len()
        )?;
        writeln!(
            self.out,
            "Total operations: {}",
            self.summary.metrics.total_requests
        )?;
        for scenario in &self.summary.scenarios_completed {
            writeln!(self.out, "  - {}", scenario.title())?;
        }
        Ok(())
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
