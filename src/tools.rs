//! SQL tool adapters exposed to the crew's agents
//!
//! A closed set of four database capabilities, dispatched against the
//! shared store handle. Query execution and query checking are paced
//! with a fixed delay to stay under the upstream provider's rate limit.
//!
//! `execute_sql` mirrors the database toolkit's contract: a malformed
//! query surfaces as an `Error: ...` string result, not an `Err`.

use crate::error::CrewError;
use crate::llm::ChatModel;
use crate::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Delay inserted before each SQL execution/check call.
pub const DEFAULT_PACING: Duration = Duration::from_secs(2);

const SCHEMA_SAMPLE_ROWS: usize = 3;

/// The fixed set of capabilities an agent can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListTables,
    TablesSchema,
    ExecuteSql,
    CheckSql,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::ListTables,
        ToolKind::TablesSchema,
        ToolKind::ExecuteSql,
        ToolKind::CheckSql,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::ListTables => "list_tables",
            ToolKind::TablesSchema => "tables_schema",
            ToolKind::ExecuteSql => "execute_sql",
            ToolKind::CheckSql => "check_sql",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::ListTables => "List the available tables in the database",
            ToolKind::TablesSchema => {
                "Input is a comma-separated list of tables, output is the schema and sample rows for those tables"
            }
            ToolKind::ExecuteSql => "Execute a SQL query against the database and return the result",
            ToolKind::CheckSql => "Double check if a SQL query is correct before executing it",
        }
    }

    pub fn from_name(name: &str) -> Option<ToolKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// Dispatches the four SQL capabilities against the shared store.
pub struct SqlToolkit {
    pool: SqlitePool,
    checker: Arc<dyn ChatModel>,
    pacing: Duration,
}

impl SqlToolkit {
    pub fn new(pool: SqlitePool, checker: Arc<dyn ChatModel>) -> Self {
        Self {
            pool,
            checker,
            pacing: DEFAULT_PACING,
        }
    }

    /// Override the pacing delay (tests zero it).
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub async fn invoke(&self, kind: ToolKind, input: &str) -> Result<String> {
        info!(tool = kind.name(), "Invoking tool");
        debug!(tool = kind.name(), input, "Tool input");

        match kind {
            ToolKind::ListTables => self.list_tables().await,
            ToolKind::TablesSchema => self.tables_schema(input).await,
            ToolKind::ExecuteSql => self.execute_sql(input).await,
            ToolKind::CheckSql => self.check_sql(input).await,
        }
    }

    /// Table names in the store, comma-separated.
    async fn list_tables(&self) -> Result<String> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CrewError::ToolError(format!("list_tables failed: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect::<Vec<_>>()
            .join(", "))
    }

    /// DDL plus a few sample rows for each requested table.
    async fn tables_schema(&self, tables: &str) -> Result<String> {
        let mut sections = Vec::new();

        for table in tables.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let ddl: Option<String> = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CrewError::ToolError(format!("tables_schema failed: {}", e)))?;

            let Some(ddl) = ddl else {
                sections.push(format!("Error: table '{}' not found in database", table));
                continue;
            };

            let columns: Vec<String> =
                sqlx::query(&format!("PRAGMA table_info(\"{}\")", table.replace('"', "\"\"")))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| CrewError::ToolError(format!("tables_schema failed: {}", e)))?
                    .iter()
                    .map(|row| row.get::<String, _>("name"))
                    .collect();

            let sample_rows = sqlx::query(&format!(
                "SELECT * FROM \"{}\" LIMIT {}",
                table.replace('"', "\"\""),
                SCHEMA_SAMPLE_ROWS
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CrewError::ToolError(format!("tables_schema failed: {}", e)))?;

            let mut section = format!(
                "{}\n\n/*\n{} rows from {} table:\n{}\n",
                ddl,
                sample_rows.len(),
                table,
                columns.join("\t")
            );
            for row in &sample_rows {
                let values: Vec<String> = (0..row.columns().len())
                    .map(|i| render_value(row, i, false))
                    .collect();
                section.push_str(&values.join("\t"));
                section.push('\n');
            }
            section.push_str("*/");

            sections.push(section);
        }

        Ok(sections.join("\n\n"))
    }

    /// Execute a query and render the rows as text. SQL failures come
    /// back as an error string result, matching the toolkit contract.
    async fn execute_sql(&self, query: &str) -> Result<String> {
        tokio::time::sleep(self.pacing).await;

        match sqlx::query(query).fetch_all(&self.pool).await {
            Ok(rows) if rows.is_empty() => Ok(String::new()),
            Ok(rows) => {
                let rendered: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let values: Vec<String> = (0..row.columns().len())
                            .map(|i| render_value(row, i, true))
                            .collect();
                        format!("({})", values.join(", "))
                    })
                    .collect();
                Ok(format!("[{}]", rendered.join(", ")))
            }
            Err(e) => Ok(format!("Error: {}", e)),
        }
    }

    /// Ask the LLM to double check a query before execution.
    async fn check_sql(&self, query: &str) -> Result<String> {
        tokio::time::sleep(self.pacing).await;

        let system = "You are a SQLite expert reviewing queries before they run.";
        let user = format!(
            r#"{}

Double check the SQLite query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query."#,
            query
        );

        self.checker.complete(system, &user).await
    }
}

/// Render a single cell as text. `quote_text` wraps TEXT values in
/// single quotes for tuple-style query output.
fn render_value(row: &SqliteRow, index: usize, quote_text: bool) -> String {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return "NULL".to_string(),
    };
    if raw.is_null() {
        return "NULL".to_string();
    }

    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" => row
            .try_get::<i64, _>(index)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "NULL".to_string()),
        "REAL" => row
            .try_get::<f64, _>(index)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "NULL".to_string()),
        "BLOB" => "<blob>".to_string(),
        _ => row
            .try_get::<String, _>(index)
            .map(|v| {
                if quote_text {
                    format!("'{}'", v)
                } else {
                    v
                }
            })
            .unwrap_or_else(|_| "NULL".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn seeded_pool(dir: &std::path::Path) -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(dir.join("tools-test.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::query("CREATE TABLE finance (Year INTEGER, Company TEXT, Revenue REAL)")
            .execute(&pool)
            .await
            .unwrap();
        for (year, company, revenue) in
            [(2021, "AAPL", 365817.0), (2022, "MSFT", 198270.0)]
        {
            sqlx::query("INSERT INTO finance VALUES (?, ?, ?)")
                .bind(year)
                .bind(company)
                .bind(revenue)
                .execute(&pool)
                .await
                .unwrap();
        }

        pool
    }

    fn toolkit(pool: SqlitePool, checker: Arc<MockChatModel>) -> SqlToolkit {
        SqlToolkit::new(pool, checker).with_pacing(Duration::ZERO)
    }

    #[test]
    fn test_tool_kind_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("web_search"), None);
    }

    #[tokio::test]
    async fn test_list_tables() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = toolkit(
            seeded_pool(dir.path()).await,
            Arc::new(MockChatModel::scripted(Vec::<String>::new())),
        );

        let result = toolkit.invoke(ToolKind::ListTables, "").await.unwrap();
        assert_eq!(result, "finance");
    }

    #[tokio::test]
    async fn test_tables_schema_contains_ddl_and_samples() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = toolkit(
            seeded_pool(dir.path()).await,
            Arc::new(MockChatModel::scripted(Vec::<String>::new())),
        );

        let result = toolkit.invoke(ToolKind::TablesSchema, "finance").await.unwrap();
        assert!(result.contains("CREATE TABLE finance"));
        assert!(result.contains("rows from finance table"));
        assert!(result.contains("AAPL"));
    }

    #[tokio::test]
    async fn test_tables_schema_unknown_table() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = toolkit(
            seeded_pool(dir.path()).await,
            Arc::new(MockChatModel::scripted(Vec::<String>::new())),
        );

        let result = toolkit
            .invoke(ToolKind::TablesSchema, "missing")
            .await
            .unwrap();
        assert!(result.contains("not found"));
    }

    #[tokio::test]
    async fn test_execute_sql_renders_rows() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = toolkit(
            seeded_pool(dir.path()).await,
            Arc::new(MockChatModel::scripted(Vec::<String>::new())),
        );

        let result = toolkit
            .invoke(
                ToolKind::ExecuteSql,
                "SELECT Year, Company FROM finance ORDER BY Year",
            )
            .await
            .unwrap();
        assert_eq!(result, "[(2021, 'AAPL'), (2022, 'MSFT')]");
    }

    #[tokio::test]
    async fn test_execute_sql_malformed_query_is_error_text() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = toolkit(
            seeded_pool(dir.path()).await,
            Arc::new(MockChatModel::scripted(Vec::<String>::new())),
        );

        let result = toolkit
            .invoke(ToolKind::ExecuteSql, "SELEC nonsense FROM nowhere")
            .await
            .unwrap();
        assert!(result.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_check_sql_delegates_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockChatModel::scripted(vec![
            "SELECT Year FROM finance",
        ]));
        let toolkit = toolkit(seeded_pool(dir.path()).await, mock.clone());

        let result = toolkit
            .invoke(ToolKind::CheckSql, "SELECT Year FROM finance")
            .await
            .unwrap();
        assert_eq!(result, "SELECT Year FROM finance");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("Double check the SQLite query"));
    }
}
