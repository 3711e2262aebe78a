//! Error types for the financial Q&A crew service

use thiserror::Error;

/// Result type alias for crew operations
pub type Result<T> = std::result::Result<T, CrewError>;

#[derive(Error, Debug)]
pub enum CrewError {

    // =============================
    // Startup Errors (all fatal)
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dataset error: {0}")]
    DatasetError(String),

    #[error("Missing required agent in configuration: {0}")]
    MissingAgent(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
