//! HTML page rendering
//!
//! Handlebars-based rendering for the two pages the service serves:
//! the question form and the result view.

use crate::error::CrewError;
use crate::Result;
use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Financial Q&amp;A Crew</title>
  <style>
    body { font-family: sans-serif; max-width: 720px; margin: 3rem auto; padding: 0 1rem; }
    textarea { width: 100%; min-height: 6rem; font-size: 1rem; padding: 0.5rem; }
    button { margin-top: 0.75rem; padding: 0.5rem 1.5rem; font-size: 1rem; }
  </style>
</head>
<body>
  <h1>Financial Q&amp;A Crew</h1>
  <p>Ask a question about the loaded financial statements.</p>
  <form action="/process" method="post">
    <textarea name="query" placeholder="e.g. Which company had the highest net income in 2022?"></textarea>
    <br>
    <button type="submit">Ask the crew</button>
  </form>
</body>
</html>
"#;

const RESULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Result - Financial Q&amp;A Crew</title>
  <style>
    body { font-family: sans-serif; max-width: 720px; margin: 3rem auto; padding: 0 1rem; }
    blockquote { border-left: 3px solid #888; margin: 0; padding-left: 1rem; color: #444; }
    pre { background: #f5f5f5; padding: 1rem; white-space: pre-wrap; }
    a { display: inline-block; margin-top: 1rem; }
  </style>
</head>
<body>
  <h1>Result</h1>
  <h2>Your question</h2>
  <blockquote>{{query}}</blockquote>
  <h2>Generated report</h2>
  <pre>{{result}}</pre>
  <a href="/">Ask another question</a>
</body>
</html>
"#;

/// Template engine for the service's HTML pages.
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with all pages registered.
    /// Registration failure is startup-fatal.
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();

        handlebars
            .register_template_string("index", INDEX_TEMPLATE)
            .map_err(|e| CrewError::TemplateError(format!("Failed to register index: {}", e)))?;
        handlebars
            .register_template_string("result", RESULT_TEMPLATE)
            .map_err(|e| CrewError::TemplateError(format!("Failed to register result: {}", e)))?;

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    /// Render the question-entry form.
    pub fn render_index(&self) -> Result<String> {
        self.handlebars
            .render("index", &json!({}))
            .map_err(|e| CrewError::TemplateError(format!("Failed to render index: {}", e)))
    }

    /// Render the result page: the echoed question plus the generated
    /// report text.
    pub fn render_result(&self, query: &str, result: &str) -> Result<String> {
        self.handlebars
            .render("result", &json!({ "query": query, "result": result }))
            .map_err(|e| CrewError::TemplateError(format!("Failed to render result: {}", e)))
    }
}
