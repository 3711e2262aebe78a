//! Crew configuration loading and validation
//!
//! Agents are declared in a YAML file and validated against a fixed
//! schema before any server route can serve traffic.

use crate::error::CrewError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn default_verbose() -> bool {
    true
}

/// One agent entry as declared in configuration.
///
/// `name`, `role`, `goal` and `backstory` are required and must be
/// non-empty. `tools` defaults to an empty list; unknown tool names are
/// resolved (and dropped) later, at crew assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

/// Top-level crew configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewConfig {
    pub agents: Vec<AgentConfig>,
}

impl CrewConfig {
    /// Schema validation beyond what deserialization enforces:
    /// required text fields must be non-empty, agent names unique.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(CrewError::ConfigError(
                "configuration declares no agents".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            for (field, value) in [
                ("name", &agent.name),
                ("role", &agent.role),
                ("goal", &agent.goal),
                ("backstory", &agent.backstory),
            ] {
                if value.trim().is_empty() {
                    return Err(CrewError::ConfigError(format!(
                        "agent '{}' has an empty '{}' field",
                        agent.name, field
                    )));
                }
            }

            if seen.contains(&agent.name) {
                return Err(CrewError::ConfigError(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
            seen.push(agent.name.clone());
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|a| a.name == name)
    }
}

/// Load and validate the crew configuration from a YAML file.
///
/// A missing file or a schema violation is an error; the caller treats
/// both as startup-fatal.
pub fn load_config(path: impl AsRef<Path>) -> Result<CrewConfig> {
    let path = path.as_ref();

    let raw = std::fs::read_to_string(path).map_err(|e| {
        CrewError::ConfigError(format!(
            "configuration file '{}' could not be read: {}",
            path.display(),
            e
        ))
    })?;

    let config: CrewConfig = serde_yaml_ng::from_str(&raw)?;
    config.validate()?;

    info!(
        path = %path.display(),
        agent_count = config.agents.len(),
        "Crew configuration loaded"
    );

    Ok(config)
}
