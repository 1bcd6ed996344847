//! Query execution against the warehouse.
//!
//! Defines the [`QueryEngine`] trait and concrete implementations:
//! - **[`SqliteEngine`]** — runs statements against a local database file.
//! - **[`HttpEngine`]** — posts statements to a remote SQL gateway.
//! - **[`DisabledEngine`]** — returns errors; used when no warehouse is
//!   configured.
//!
//! [`QueryExecutor`] wraps whichever engine the config selects and memoizes
//! outcomes by exact statement text for the lifetime of the process. The
//! cache has no eviction; sessions are short-lived, and a long-lived host
//! should create one executor per session.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::WarehouseConfig;
use crate::error::ChatError;
use crate::models::Table;

/// A warehouse backend that can run one SQL statement.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine identifier used in logs (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Run the statement and return the full result set.
    async fn run(&self, sql: &str) -> Result<Table>;
}

/// Instantiate the engine selected by `[warehouse] engine`.
pub async fn create_engine(config: &WarehouseConfig) -> Result<Box<dyn QueryEngine>> {
    match config.engine.as_str() {
        "sqlite" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("warehouse.path required for sqlite engine"))?;
            Ok(Box::new(SqliteEngine::connect(path).await?))
        }
        "http" => {
            let url = config
                .url
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("warehouse.url required for http engine"))?;
            Ok(Box::new(HttpEngine::new(url, config.timeout_secs)?))
        }
        "disabled" => Ok(Box::new(DisabledEngine)),
        other => bail!("Unknown warehouse engine: {}", other),
    }
}

// ============ Sqlite Engine ============

/// Engine backed by a local SQLite database file.
pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    pub async fn connect(path: &std::path::Path) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(false)
            .read_only(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryEngine for SqliteEngine {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn run(&self, sql: &str) -> Result<Table> {
        let rows: Vec<SqliteRow> = sqlx::query(sql).fetch_all(&self.pool).await?;

        let Some(first) = rows.first() else {
            return Ok(Table::empty());
        };

        let columns: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let data = rows
            .iter()
            .map(|row| (0..columns.len()).map(|i| cell_value(row, i)).collect())
            .collect();

        Ok(Table {
            columns,
            rows: data,
        })
    }
}

/// Decode one cell into a JSON value using the column's reported type.
fn cell_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return serde_json::Value::Null;
    };
    if raw.is_null() {
        return serde_json::Value::Null;
    }

    match raw.type_info().name() {
        "INTEGER" => row
            .try_get::<i64, _>(index)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "REAL" => row
            .try_get::<f64, _>(index)
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(serde_json::Value::Number))
            .unwrap_or(serde_json::Value::Null),
        "BOOLEAN" => row
            .try_get::<bool, _>(index)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}

// ============ HTTP Engine ============

/// Engine that forwards statements to a remote SQL gateway.
///
/// Wire contract: `POST <url>` with `{"statement": "<sql>"}`; success bodies
/// carry `{"columns": [..], "rows": [[..]]}`, failures an HTTP status >= 400
/// with `{"message": "<engine error>"}`.
pub struct HttpEngine {
    http: reqwest::Client,
    url: String,
}

impl HttpEngine {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl QueryEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, sql: &str) -> Result<Table> {
        let response = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "statement": sql }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() >= 400 {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or(text);
            bail!("{}", message);
        }

        let table: Table = serde_json::from_str(&text)?;
        Ok(table)
    }
}

// ============ Disabled Engine ============

/// A no-op engine that always errors.
pub struct DisabledEngine;

#[async_trait]
impl QueryEngine for DisabledEngine {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn run(&self, _sql: &str) -> Result<Table> {
        bail!("Warehouse engine is disabled. Set [warehouse] engine in config.")
    }
}

// ============ Memoizing executor ============

type MemoEntry = std::result::Result<Arc<Table>, String>;

/// Executes statements through the configured engine, memoizing outcomes by
/// exact statement text. Re-renders of the same SQL block hit the cache and
/// never reach the warehouse again.
pub struct QueryExecutor {
    engine: Box<dyn QueryEngine>,
    cache: Mutex<HashMap<String, MemoEntry>>,
}

impl QueryExecutor {
    pub fn new(engine: Box<dyn QueryEngine>) -> Self {
        Self {
            engine,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run `sql`, or return the memoized outcome for identical text.
    ///
    /// Successful results are shared (`Arc`): two calls with the same text
    /// return the same table object. Engine failures are memoized too, as
    /// [`ChatError::SqlExecution`].
    pub async fn execute(&self, sql: &str) -> std::result::Result<Arc<Table>, ChatError> {
        if let Some(hit) = self.lock_cache().get(sql) {
            return hit.clone().map_err(ChatError::SqlExecution);
        }

        tracing::debug!(engine = self.engine.name(), "executing statement");
        let outcome: MemoEntry = match self.engine.run(sql).await {
            Ok(table) => Ok(Arc::new(table)),
            Err(e) => {
                tracing::warn!(engine = self.engine.name(), error = %e, "statement failed");
                Err(format!("{:#}", e))
            }
        };

        self.lock_cache().insert(sql.to_string(), outcome.clone());
        outcome.map_err(ChatError::SqlExecution)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<String, MemoEntry>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    fn counting_executor(fail: bool) -> (QueryExecutor, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = QueryExecutor::new(Box::new(CountingEngine {
            calls: Arc::clone(&calls),
            fail,
        }));
        (executor, calls)
    }

    #[async_trait]
    impl QueryEngine for CountingEngine {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, _sql: &str) -> Result<Table> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                bail!("no such table: revenue");
            }
            Ok(Table {
                columns: vec!["n".to_string()],
                rows: vec![vec![serde_json::json!(1)]],
            })
        }
    }

    #[tokio::test]
    async fn test_identical_sql_returns_identical_object() {
        let (executor, _) = counting_executor(false);

        let first = executor.execute("SELECT 1").await.unwrap();
        let second = executor.execute("SELECT 1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_memoized_call_skips_engine() {
        let (executor, calls) = counting_executor(false);

        executor.execute("SELECT 1").await.unwrap();
        executor.execute("SELECT 1").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        executor.execute("SELECT 2").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_memoized_as_sql_errors() {
        let (executor, calls) = counting_executor(true);

        let first = executor.execute("SELECT * FROM revenue").await;
        let second = executor.execute("SELECT * FROM revenue").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        for outcome in [first, second] {
            match outcome {
                Err(ChatError::SqlExecution(msg)) => assert!(msg.contains("no such table")),
                other => panic!("expected SqlExecution, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_disabled_engine_errors() {
        let executor = QueryExecutor::new(Box::new(DisabledEngine));
        let err = executor.execute("SELECT 1").await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
