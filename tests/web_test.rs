//! Handler tests for the web front end
//!
//! These tests drive the real router in-process with a scripted chat
//! model: form page served, missing query rejected before the pipeline
//! runs, well-formed question produces a rendered report.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use finance_crew::config::load_config;
use finance_crew::crew::Crew;
use finance_crew::dataset::load_dataset;
use finance_crew::llm::MockChatModel;
use finance_crew::templates::TemplateEngine;
use finance_crew::tools::SqlToolkit;
use finance_crew::web::{create_router, AppState};
use http_body_util::BodyExt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // For oneshot()

const CONFIG_YAML: &str = r#"
agents:
  - name: sql_dev
    role: Senior SQL Developer
    goal: Extract data from the finance database
    backstory: A database engineer who writes precise SQLite queries.
    tools:
      - list_tables
      - tables_schema
      - check_sql
      - execute_sql
  - name: data_analyst
    role: Senior Data Analyst
    goal: Analyze the extracted data
    backstory: An analyst who turns raw rows into clear findings.
  - name: report_writer
    role: Report Writer
    goal: Summarize the analysis
    backstory: A writer of short executive summaries.
"#;

async fn body_text(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn test_state(dir: &std::path::Path, mock: Arc<MockChatModel>) -> AppState {
    let csv_path = dir.join("statements.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "Year,Company,Net Income (in M)").unwrap();
    writeln!(file, "2021,AAPL,94680").unwrap();
    writeln!(file, "2022,MSFT,72738").unwrap();

    let config_path = dir.join("config.yaml");
    std::fs::write(&config_path, CONFIG_YAML).unwrap();

    let pool = load_dataset(&csv_path, dir.join("finance.db"), "finance")
        .await
        .unwrap();
    let config = load_config(&config_path).unwrap();

    let toolkit = SqlToolkit::new(pool, mock.clone()).with_pacing(Duration::ZERO);
    let crew = Arc::new(Crew::assemble(&config, toolkit, mock).unwrap());
    let templates = Arc::new(TemplateEngine::new().unwrap());

    AppState { crew, templates }
}

#[tokio::test]
async fn test_index_serves_query_form() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockChatModel::scripted(Vec::<String>::new()));
    let app = create_router(test_state(dir.path(), mock).await);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response.into_body()).await;
    assert!(body.contains(r#"name="query""#));
    assert!(body.contains(r#"action="/process""#));
}

#[tokio::test]
async fn test_process_without_query_is_400_and_skips_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockChatModel::scripted(Vec::<String>::new()));
    let app = create_router(test_state(dir.path(), mock.clone()).await);

    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_text(response.into_body()).await;
    assert!(body.contains("Please provide a query."));
    assert_eq!(mock.call_count(), 0, "pipeline must not be invoked");
}

#[tokio::test]
async fn test_process_blank_query_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockChatModel::scripted(Vec::<String>::new()));
    let app = create_router(test_state(dir.path(), mock.clone()).await);

    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("query=+++"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_process_renders_question_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockChatModel::scripted(vec![
        r#"{"action": "tool", "tool": "execute_sql", "input": "SELECT Year, Net_Income_in_M FROM finance ORDER BY Net_Income_in_M DESC"}"#,
        r#"{"action": "final", "answer": "[(2021, 94680), (2022, 72738)]"}"#,
        "Net income was highest in 2021.",
        "## Summary\nNet income peaked in 2021.",
    ]));
    let app = create_router(test_state(dir.path(), mock.clone()).await);

    let request = Request::builder()
        .method("POST")
        .uri("/process")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("query=Which+year+had+the+highest+net+income%3F"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response.into_body()).await;
    assert!(body.contains("Which year had the highest net income?"));
    assert!(body.contains("Net income peaked in 2021."));

    // The extract agent really went through the SQL tool loop
    let calls = mock.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[1].1.contains("Action taken: execute_sql"));
    assert!(calls[1].1.contains("94680"));
}
