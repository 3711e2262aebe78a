//! Crew assembly and the sequential task pipeline
//!
//! Agents come from configuration; the task chain is fixed:
//! extract → analyze → summarize, each task consuming the output of its
//! predecessor as context. The crew is assembled once at startup and
//! shared across requests; all mutable state lives in the per-request
//! query session.

use crate::config::{AgentConfig, CrewConfig};
use crate::error::CrewError;
use crate::llm::ChatModel;
use crate::tools::{SqlToolkit, ToolKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Agent names the task chain is wired to. Their absence from
/// configuration is a startup error, not a runtime surprise.
pub const SQL_DEV: &str = "sql_dev";
pub const DATA_ANALYST: &str = "data_analyst";
pub const REPORT_WRITER: &str = "report_writer";

const REQUIRED_AGENTS: [&str; 3] = [SQL_DEV, DATA_ANALYST, REPORT_WRITER];

/// Upper bound on tool-invocation turns for one task.
const MAX_TOOL_TURNS: usize = 10;

/// A role-bound language-model persona with a subset of the available
/// tool operations.
pub struct Agent {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<ToolKind>,
    pub allow_delegation: bool,
    pub verbose: bool,
}

impl Agent {
    /// Resolve declared tool names against the closed capability set.
    /// Unknown names are dropped with a warning; the agent simply has
    /// fewer tools.
    fn from_config(conf: &AgentConfig) -> Agent {
        let mut tools = Vec::with_capacity(conf.tools.len());
        for name in &conf.tools {
            match ToolKind::from_name(name) {
                Some(kind) => tools.push(kind),
                None => warn!(
                    agent = %conf.name,
                    tool = %name,
                    "Unknown tool name in configuration, dropping"
                ),
            }
        }

        Agent {
            name: conf.name.clone(),
            role: conf.role.clone(),
            goal: conf.goal.clone(),
            backstory: conf.backstory.clone(),
            tools,
            allow_delegation: conf.allow_delegation,
            verbose: conf.verbose,
        }
    }

    fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|kind| kind.name()).collect()
    }

    /// Look a tool up among the capabilities granted to THIS agent.
    fn resolve(&self, name: &str) -> Option<ToolKind> {
        self.tools.iter().copied().find(|kind| kind.name() == name)
    }

    fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        );

        if !self.tools.is_empty() {
            prompt.push_str("\n\nYou can use the following tools:\n");
            for kind in &self.tools {
                prompt.push_str(&format!("- {}: {}\n", kind.name(), kind.description()));
            }
            prompt.push_str(
                r#"
To use a tool, reply with exactly one JSON object:
{"action": "tool", "tool": "<tool name>", "input": "<tool input>"}

When you have the final answer, reply with:
{"action": "final", "answer": "<your answer>"}

Reply with a single JSON object and nothing else."#,
            );
        }

        prompt
    }
}

/// A unit of work assigned to one agent. `description` may contain a
/// `{query}` placeholder; `context` lists the indices of upstream tasks
/// whose outputs are injected before this one runs.
pub struct Task {
    pub name: &'static str,
    pub description: &'static str,
    pub expected_output: &'static str,
    pub agent: &'static str,
    pub context: &'static [usize],
}

/// Execution mode for the pipeline. Only sequential execution exists:
/// each task begins only after its predecessors complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Sequential,
}

/// Output of a single completed task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub output: String,
}

/// Result of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    pub session_id: Uuid,
    pub query: String,
    pub final_output: String,
    pub task_outputs: Vec<TaskOutput>,
    pub started_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// The ordered assembly of agents and tasks, executed start-to-finish
/// for one input question.
pub struct Crew {
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    process: Process,
    toolkit: SqlToolkit,
    model: Arc<dyn ChatModel>,
}

impl Crew {
    /// Build agents from validated configuration, verify the task
    /// chain's agent names exist, and wire the fixed three-task chain.
    pub fn assemble(
        config: &CrewConfig,
        toolkit: SqlToolkit,
        model: Arc<dyn ChatModel>,
    ) -> Result<Crew> {
        for required in REQUIRED_AGENTS {
            if config.get(required).is_none() {
                return Err(CrewError::MissingAgent(required.to_string()));
            }
        }

        let agents: Vec<Agent> = config.agents.iter().map(Agent::from_config).collect();

        let tasks = vec![
            Task {
                name: "extract_data",
                description: "Extract the data required to answer the question: {query}.",
                expected_output: "A list of data from the database that answers the question.",
                agent: SQL_DEV,
                context: &[],
            },
            Task {
                name: "analyze_data",
                description:
                    "Analyze the data provided and write a brief analysis for the question: {query}.",
                expected_output: "A short, easy-to-understand text analyzing the provided data.",
                agent: DATA_ANALYST,
                context: &[0],
            },
            Task {
                name: "write_report",
                description: "Write an executive summary of the report from the analysis. \
                              The report must be less than 50 words and presented in markdown.",
                expected_output: "A markdown report summarizing the analysis.",
                agent: REPORT_WRITER,
                context: &[1],
            },
        ];

        info!(
            agent_count = agents.len(),
            task_count = tasks.len(),
            "Crew assembled"
        );

        Ok(Crew {
            agents,
            tasks,
            process: Process::Sequential,
            toolkit,
            model,
        })
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn agent(&self, name: &str) -> Result<&Agent> {
        self.agents
            .iter()
            .find(|agent| agent.name == name)
            .ok_or_else(|| CrewError::MissingAgent(name.to_string()))
    }

    /// Run the full task chain for one question, strictly in order.
    pub async fn kickoff(&self, query: &str) -> Result<CrewOutput> {
        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(%session_id, query, "Crew kickoff");

        let mut task_outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let agent = self.agent(task.agent)?;

            info!(%session_id, task = task.name, agent = %agent.name, "Task running");

            let description = task.description.replace("{query}", query);
            let context: Vec<&str> = task
                .context
                .iter()
                .filter_map(|&i| task_outputs.get(i).map(|out| out.output.as_str()))
                .collect();

            let output = self
                .run_task(agent, &description, task.expected_output, &context)
                .await?;

            if agent.verbose {
                debug!(%session_id, task = task.name, output = %output, "Task output");
            }
            info!(%session_id, task = task.name, "Task complete");

            task_outputs.push(TaskOutput {
                task: task.name.to_string(),
                agent: agent.name.clone(),
                output,
            });
        }

        let final_output = task_outputs
            .last()
            .map(|out| out.output.clone())
            .ok_or_else(|| CrewError::TaskError("pipeline produced no output".to_string()))?;

        info!(%session_id, elapsed_ms = start.elapsed().as_millis() as u64, "Crew complete");

        Ok(CrewOutput {
            session_id,
            query: query.to_string(),
            final_output,
            task_outputs,
            started_at,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run one task: a single completion for tool-less agents, a bounded
    /// action loop for tool-equipped ones.
    async fn run_task(
        &self,
        agent: &Agent,
        description: &str,
        expected_output: &str,
        context: &[&str],
    ) -> Result<String> {
        let system = agent.system_prompt();

        let mut user = description.to_string();
        if !context.is_empty() {
            user.push_str("\n\nThis is the context you are working with:\n");
            for chunk in context {
                user.push_str(chunk);
                user.push('\n');
            }
        }
        user.push_str(&format!("\nExpected output: {}", expected_output));

        if agent.tools.is_empty() {
            return self.model.complete(&system, &user).await;
        }

        let mut transcript = user;
        let mut last_reply = String::new();

        for turn in 0..MAX_TOOL_TURNS {
            let reply = self.model.complete(&system, &transcript).await?;

            match parse_agent_action(&reply) {
                AgentAction::Final { answer } => return Ok(answer),
                AgentAction::Tool { tool, input } => match agent.resolve(&tool) {
                    Some(kind) => {
                        let observation = self.toolkit.invoke(kind, &input).await?;
                        debug!(agent = %agent.name, tool = %tool, turn, "Tool observation");
                        transcript.push_str(&format!(
                            "\n\nAction taken: {} with input: {}\nObservation:\n{}\n\n\
                             Continue. Reply with the next JSON action, or the final answer.",
                            tool, input, observation
                        ));
                    }
                    None => {
                        transcript.push_str(&format!(
                            "\n\nThe tool '{}' is not available to you. Available tools: {}.\n\
                             Reply with the next JSON action, or the final answer.",
                            tool,
                            agent.tool_names().join(", ")
                        ));
                    }
                },
            }

            last_reply = reply;
        }

        warn!(agent = %agent.name, "Agent exhausted tool turns, using last reply");
        Ok(last_reply)
    }
}

enum AgentAction {
    Tool { tool: String, input: String },
    Final { answer: String },
}

/// Parse an agent reply into an action. Markdown fences are stripped;
/// a reply that is not a JSON action is accepted as the final answer.
fn parse_agent_action(reply: &str) -> AgentAction {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let Ok(json) = serde_json::from_str::<Value>(cleaned) else {
        return AgentAction::Final {
            answer: reply.trim().to_string(),
        };
    };

    match json.get("action").and_then(Value::as_str) {
        Some("tool") => {
            let tool = json
                .get("tool")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let input = match json.get("input") {
                Some(Value::String(text)) => text.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => String::new(),
            };
            AgentAction::Tool { tool, input }
        }
        Some("final") => AgentAction::Final {
            answer: json
                .get("answer")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| cleaned.to_string()),
        },
        _ => AgentAction::Final {
            answer: reply.trim().to_string(),
        },
    }
}
