use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::DatabasesConfig;

/// Target database for one tool call. Resolved once when the tool call
/// is generated and carried through suspension as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseResource {
    Hr,
    Sales,
}

impl DatabaseResource {
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseResource::Hr => "hr",
            DatabaseResource::Sales => "sales",
        }
    }

    pub fn tool_name(self) -> &'static str {
        match self {
            DatabaseResource::Hr => "query_hr_database",
            DatabaseResource::Sales => "query_sales_database",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        match name {
            "query_hr_database" => Some(DatabaseResource::Hr),
            "query_sales_database" => Some(DatabaseResource::Sales),
            _ => None,
        }
    }
}

/// Execution seam. The workflow engine only ever reaches a database
/// through this trait, which is what makes the approval gate testable.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, resource: DatabaseResource, sql: &str) -> Result<Value>;
}

/// Runs statements against the configured sqlite files, one connection
/// per call, off the async runtime via `spawn_blocking`.
pub struct SqliteExecutor {
    hr_path: PathBuf,
    sales_path: PathBuf,
}

impl SqliteExecutor {
    pub fn new(config: &DatabasesConfig) -> Self {
        Self {
            hr_path: PathBuf::from(&config.hr_path),
            sales_path: PathBuf::from(&config.sales_path),
        }
    }

    fn path_for(&self, resource: DatabaseResource) -> &Path {
        match resource {
            DatabaseResource::Hr => &self.hr_path,
            DatabaseResource::Sales => &self.sales_path,
        }
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, resource: DatabaseResource, sql: &str) -> Result<Value> {
        let path = self.path_for(resource).to_path_buf();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || run_statement(&path, &sql))
            .await
            .map_err(|err| anyhow!("execution task failed: {err}"))?
            .with_context(|| format!("{} database", resource.as_str()))
    }
}

fn run_statement(path: &Path, sql: &str) -> Result<Value> {
    let conn = Connection::open(path)
        .with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.pragma_update(None, "busy_timeout", 5000).ok();

    let mut stmt = conn.prepare(sql)?;
    if stmt.column_count() == 0 {
        drop(stmt);
        let affected = conn.execute(sql, [])?;
        return Ok(json!({ "rows_affected": affected }));
    }

    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let mut rows_out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut object = Map::new();
        for (index, column) in columns.iter().enumerate() {
            object.insert(column.clone(), column_value(row.get_ref(index)?)?);
        }
        rows_out.push(Value::Object(object));
    }
    Ok(json!({ "row_count": rows_out.len(), "rows": rows_out }))
}

fn column_value(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db(dir: &Path) -> PathBuf {
        let path = dir.join("hr.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE employees (id INTEGER PRIMARY KEY, name TEXT, salary REAL);
             INSERT INTO employees (name, salary) VALUES ('Alice', 9000.5), ('Bob', 7200.0);",
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn select_returns_rows_as_objects() {
        let dir = tempfile::tempdir().unwrap();
        let hr = seeded_db(dir.path());
        let executor = SqliteExecutor {
            hr_path: hr,
            sales_path: dir.path().join("sales.db"),
        };
        let result = executor
            .execute(DatabaseResource::Hr, "SELECT name, salary FROM employees ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result["row_count"], 2);
        assert_eq!(result["rows"][0]["name"], "Alice");
        assert_eq!(result["rows"][1]["salary"], 7200.0);
    }

    #[tokio::test]
    async fn mutation_reports_rows_affected() {
        let dir = tempfile::tempdir().unwrap();
        let hr = seeded_db(dir.path());
        let executor = SqliteExecutor {
            hr_path: hr,
            sales_path: dir.path().join("sales.db"),
        };
        let result = executor
            .execute(DatabaseResource::Hr, "UPDATE employees SET salary = salary + 1")
            .await
            .unwrap();
        assert_eq!(result["rows_affected"], 2);
    }

    #[tokio::test]
    async fn invalid_sql_surfaces_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let hr = seeded_db(dir.path());
        let executor = SqliteExecutor {
            hr_path: hr,
            sales_path: dir.path().join("sales.db"),
        };
        let outcome = executor
            .execute(DatabaseResource::Hr, "SELECT FROM nowhere")
            .await;
        assert!(outcome.is_err());
    }

    #[test]
    fn tool_names_round_trip_to_resources() {
        assert_eq!(
            DatabaseResource::from_tool_name("query_hr_database"),
            Some(DatabaseResource::Hr)
        );
        assert_eq!(
            DatabaseResource::from_tool_name("query_sales_database"),
            Some(DatabaseResource::Sales)
        );
        assert_eq!(DatabaseResource::from_tool_name("query_crm"), None);
    }

    #[test]
    fn near_miss_tool_names_do_not_resolve() {
        // Only the exact registered names map to a database.
        assert_eq!(DatabaseResource::from_tool_name("query_chrome_db"), None);
        assert_eq!(DatabaseResource::from_tool_name("hr"), None);
        assert_eq!(DatabaseResource::from_tool_name("QUERY_HR_DATABASE"), None);
    }
}
