//! Dataset loading: delimited source file → embedded relational store
//!
//! Runs once at startup, before any traffic is served. The load replaces
//! any prior table of the same name, so the store always reflects exactly
//! one load of the source file per process lifetime.

use crate::error::CrewError;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default source file, as shipped alongside the service.
pub const DEFAULT_DATASET_PATH: &str = "Financial Statements.csv";

/// Default on-disk store and table name.
pub const DEFAULT_DATABASE_PATH: &str = "finance.db";
pub const DEFAULT_TABLE_NAME: &str = "finance";

/// Normalize a raw column label: trim, spaces become underscores,
/// parentheses are removed, slashes become underscores.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .replace(' ', "_")
        .replace(['(', ')'], "")
        .replace('/', "_")
}

/// SQLite column affinity inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build the final header list: normalized, never empty, never duplicated.
fn build_headers(raw: &csv::StringRecord) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());

    for (i, field) in raw.iter().enumerate() {
        let mut name = normalize_column_name(field);
        if name.is_empty() {
            name = format!("column_{}", i);
        }

        // Deduplicate with a numeric suffix
        if headers.contains(&name) {
            let mut n = 2;
            while headers.contains(&format!("{}_{}", name, n)) {
                n += 1;
            }
            name = format!("{}_{}", name, n);
        }

        headers.push(name);
    }

    headers
}

/// Scan every cell of a column; all-integer wins INTEGER, all-numeric
/// wins REAL, anything else falls back to TEXT. Empty cells are NULLs
/// and do not influence the choice.
fn infer_column_types(column_count: usize, records: &[csv::StringRecord]) -> Vec<ColumnType> {
    (0..column_count)
        .map(|i| {
            let mut seen_value = false;
            let mut all_int = true;
            let mut all_real = true;

            for record in records {
                let cell = record.get(i).unwrap_or("").trim();
                if cell.is_empty() {
                    continue;
                }
                seen_value = true;
                if cell.parse::<i64>().is_err() {
                    all_int = false;
                }
                if cell.parse::<f64>().is_err() {
                    all_real = false;
                }
            }

            if !seen_value {
                ColumnType::Text
            } else if all_int {
                ColumnType::Integer
            } else if all_real {
                ColumnType::Real
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

/// Read the source file and materialize it into the store, replacing any
/// prior table of the same name. Any read or write failure is an error;
/// the process must not start without a usable store.
pub async fn load_dataset(
    csv_path: impl AsRef<Path>,
    db_path: impl AsRef<Path>,
    table: &str,
) -> Result<SqlitePool> {
    let csv_path = csv_path.as_ref();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .map_err(|e| {
            CrewError::DatasetError(format!(
                "source file '{}' could not be read: {}",
                csv_path.display(),
                e
            ))
        })?;

    let headers = build_headers(
        reader
            .headers()
            .map_err(|e| CrewError::DatasetError(format!("invalid header row: {}", e)))?,
    );

    let mut records = Vec::new();
    for record in reader.records() {
        records
            .push(record.map_err(|e| CrewError::DatasetError(format!("invalid row: {}", e)))?);
    }

    let types = infer_column_types(headers.len(), &records);

    let connect_options = SqliteConnectOptions::new()
        .filename(db_path.as_ref())
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    let quoted_table = quote_ident(table);
    let column_defs: Vec<String> = headers
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_name()))
        .collect();

    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted_table))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE {} ({})",
        quoted_table,
        column_defs.join(", ")
    ))
    .execute(&mut *tx)
    .await?;

    let placeholders = vec!["?"; headers.len()].join(", ");
    let insert_sql = format!("INSERT INTO {} VALUES ({})", quoted_table, placeholders);

    for record in &records {
        let mut query = sqlx::query(&insert_sql);
        for (i, ty) in types.iter().enumerate() {
            let cell = record.get(i).unwrap_or("").trim();
            if cell.is_empty() {
                query = query.bind(None::<String>);
                continue;
            }
            query = match ty {
                ColumnType::Integer => {
                    let value = cell.parse::<i64>().map_err(|e| {
                        CrewError::DatasetError(format!("integer column parse failed: {}", e))
                    })?;
                    query.bind(value)
                }
                ColumnType::Real => {
                    let value = cell.parse::<f64>().map_err(|e| {
                        CrewError::DatasetError(format!("numeric column parse failed: {}", e))
                    })?;
                    query.bind(value)
                }
                ColumnType::Text => query.bind(cell.to_string()),
            };
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;

    info!(
        source = %csv_path.display(),
        table,
        rows = records.len(),
        columns = headers.len(),
        "Dataset loaded into relational store"
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use std::io::Write;

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(
            normalize_column_name(" Market Cap(in B USD) "),
            "Market_Capin_B_USD"
        );
        assert_eq!(normalize_column_name("Net Income"), "Net_Income");
        assert_eq!(normalize_column_name("Debt/Equity Ratio"), "Debt_Equity_Ratio");
        assert_eq!(normalize_column_name("Year"), "Year");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_column_name("Earning Per Share (USD)");
        let twice = normalize_column_name(&once);
        assert_eq!(once, twice);
        assert!(!once.contains(' '));
        assert!(!once.contains('('));
        assert!(!once.contains(')'));
        assert!(!once.contains('/'));
    }

    #[test]
    fn test_build_headers_empty_and_duplicate() {
        let raw = csv::StringRecord::from(vec!["Year", "", "Year", "Net Income"]);
        let headers = build_headers(&raw);
        assert_eq!(headers, vec!["Year", "column_1", "Year_2", "Net_Income"]);
    }

    fn write_sample_csv(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("sample.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Year,Company ,Revenue (in M),Debt/Equity").unwrap();
        writeln!(file, "2021,AAPL,365817,1.73").unwrap();
        writeln!(file, "2022,MSFT,198270,0.47").unwrap();
        writeln!(file, "2023,GOOG,,0.12").unwrap();
        path
    }

    async fn column_names(pool: &SqlitePool, table: &str) -> Vec<String> {
        sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(pool)
            .await
            .unwrap()
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect()
    }

    #[tokio::test]
    async fn test_load_dataset_normalizes_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_sample_csv(dir.path());
        let db_path = dir.path().join("finance.db");

        let pool = load_dataset(&csv_path, &db_path, "finance").await.unwrap();

        let names = column_names(&pool, "finance").await;
        assert_eq!(names, vec!["Year", "Company", "Revenue_in_M", "Debt_Equity"]);

        let rows = sqlx::query("SELECT COUNT(*) AS n FROM finance")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows.get::<i64, _>("n"), 3);

        // Numeric columns keep numeric affinity
        let avg = sqlx::query("SELECT AVG(Year) AS avg_year FROM finance")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(avg.get::<f64, _>("avg_year"), 2022.0);
    }

    #[tokio::test]
    async fn test_reload_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = write_sample_csv(dir.path());
        let db_path = dir.path().join("finance.db");

        let pool = load_dataset(&csv_path, &db_path, "finance").await.unwrap();
        let first = column_names(&pool, "finance").await;
        drop(pool);

        let pool = load_dataset(&csv_path, &db_path, "finance").await.unwrap();
        let second = column_names(&pool, "finance").await;
        assert_eq!(first, second);

        let rows = sqlx::query("SELECT COUNT(*) AS n FROM finance")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows.get::<i64, _>("n"), 3, "reload must replace, not append");
    }

    #[tokio::test]
    async fn test_load_dataset_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_dataset(
            dir.path().join("absent.csv"),
            dir.path().join("finance.db"),
            "finance",
        )
        .await;
        assert!(matches!(result, Err(CrewError::DatasetError(_))));
    }
}
