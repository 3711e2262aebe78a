use finance_crew::config::{load_config, DEFAULT_CONFIG_PATH};
use finance_crew::crew::Crew;
use finance_crew::dataset::{
    load_dataset, DEFAULT_DATABASE_PATH, DEFAULT_DATASET_PATH, DEFAULT_TABLE_NAME,
};
use finance_crew::llm::GroqClient;
use finance_crew::templates::TemplateEngine;
use finance_crew::tools::SqlToolkit;
use finance_crew::web::{start_server, AppState};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_key = match std::env::var("GROQ_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!("GROQ_API_KEY environment variable not set. Refusing to start.");
            std::process::exit(1);
        }
    };

    let dataset_path =
        std::env::var("DATASET_PATH").unwrap_or_else(|_| DEFAULT_DATASET_PATH.to_string());
    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
    let config_path =
        std::env::var("CREW_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Financial Q&A Crew - server starting");
    info!(port, dataset = %dataset_path, config = %config_path, "Startup parameters");

    // One-time setup: dataset → store, configuration → crew. Any failure
    // here must prevent the listener from ever binding.
    let pool = match load_dataset(&dataset_path, &database_path, DEFAULT_TABLE_NAME).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Database setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration loading failed: {}", e);
            std::process::exit(1);
        }
    };

    let model = match GroqClient::new(api_key) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("LLM client construction failed: {}", e);
            std::process::exit(1);
        }
    };

    let toolkit = SqlToolkit::new(pool, model.clone());

    let crew = match Crew::assemble(&config, toolkit, model) {
        Ok(crew) => Arc::new(crew),
        Err(e) => {
            error!("Crew assembly failed: {}", e);
            std::process::exit(1);
        }
    };

    let templates = match TemplateEngine::new() {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Template registration failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("Crew initialized, starting web server");

    start_server(AppState { crew, templates }, port).await?;

    Ok(())
}
