//! Financial Q&A Crew
//!
//! A web service that answers natural-language questions about a
//! financial dataset:
//! - Loads a tabular source file into an embedded relational store at startup
//! - Builds a crew of role-bound LLM agents from declarative configuration
//! - Runs a fixed sequential task chain per question:
//!   extract (SQL tools) → analyze → summarize
//! - Renders the generated report back to the browser
//!
//! PIPELINE:
//! QUESTION → EXTRACT → ANALYZE → SUMMARIZE → REPORT

pub mod config;
pub mod crew;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod templates;
pub mod tools;
pub mod web;

pub use error::Result;

// Re-export common types
pub use config::{load_config, AgentConfig, CrewConfig};
pub use crew::{Crew, CrewOutput};
pub use error::CrewError;
