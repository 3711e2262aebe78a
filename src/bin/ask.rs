//! One-shot CLI: run the crew against a single question and print the
//! per-task outputs. Useful for exercising the pipeline without the web
//! front end.

use finance_crew::config::{load_config, DEFAULT_CONFIG_PATH};
use finance_crew::crew::Crew;
use finance_crew::dataset::{
    load_dataset, DEFAULT_DATABASE_PATH, DEFAULT_DATASET_PATH, DEFAULT_TABLE_NAME,
};
use finance_crew::llm::GroqClient;
use finance_crew::tools::SqlToolkit;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    dotenv::dotenv().ok();

    let question: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        eprintln!("Usage: ask <question about the financial dataset>");
        std::process::exit(2);
    }

    let api_key = match std::env::var("GROQ_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("GROQ_API_KEY environment variable not set. Refusing to start.");
            std::process::exit(1);
        }
    };

    let dataset_path =
        std::env::var("DATASET_PATH").unwrap_or_else(|_| DEFAULT_DATASET_PATH.to_string());
    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
    let config_path =
        std::env::var("CREW_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let pool = load_dataset(&dataset_path, &database_path, DEFAULT_TABLE_NAME).await?;
    let config = load_config(&config_path)?;
    let model = Arc::new(GroqClient::new(api_key)?);
    let toolkit = SqlToolkit::new(pool, model.clone());
    let crew = Crew::assemble(&config, toolkit, model)?;

    info!(question = %question, "Running crew");

    let output = crew.kickoff(&question).await?;

    println!("\n=== CREW RESULT ===");
    println!("Session: {}", output.session_id);
    println!("Elapsed: {} ms", output.execution_time_ms);
    for task in &output.task_outputs {
        println!("\n--- {} ({}) ---", task.task, task.agent);
        println!("{}", task.output);
    }
    println!("\n=== FINAL REPORT ===");
    println!("{}", output.final_output);

    Ok(())
}
