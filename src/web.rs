//! Web front end for the financial Q&A crew
//!
//! Two user-facing routes: the question form and the synchronous
//! processing endpoint. The crew and template engine are constructed at
//! startup and injected through router state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::crew::Crew;
use crate::templates::TemplateEngine;

/// =============================
/// App State
/// =============================

#[derive(Clone)]
pub struct AppState {
    pub crew: Arc<Crew>,
    pub templates: Arc<TemplateEngine>,
}

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ProcessForm {
    #[serde(default)]
    query: Option<String>,
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn index(State(state): State<AppState>) -> Response {
    match state.templates.render_index() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Index rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Process the user's question: bind it into the pipeline and block
/// until the full task chain completes.
async fn process(State(state): State<AppState>, Form(form): Form<ProcessForm>) -> Response {
    let Some(query) = form
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
    else {
        return (StatusCode::BAD_REQUEST, "Please provide a query.").into_response();
    };

    info!(query = %query, "Received question");

    let output = match state.crew.kickoff(&query).await {
        Ok(output) => output,
        Err(e) => {
            error!("Crew execution failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Crew execution failed: {}", e),
            )
                .into_response();
        }
    };

    match state
        .templates
        .render_result(&output.query, &output.final_output)
    {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Result rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: AppState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
