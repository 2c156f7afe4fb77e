//! Query backends: where generated commands run.

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Column, Row, TypeInfo};
use tracing::{debug, info};
use url::Url;

use crate::ast::Value;
use crate::engine::Record;
use crate::error::ExecutionError;

/// Runs command text with positional parameters against a database target.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Make sure a connection to `target` can be used. Called by USE.
    async fn open(&self, target: &str) -> Result<(), ExecutionError>;

    /// Rows produced by the command.
    async fn fetch(&self, target: &str, command: &str, params: &[Value]) -> Result<Vec<Record>, ExecutionError>;

    /// Number of rows the command affected.
    async fn execute(&self, target: &str, command: &str, params: &[Value]) -> Result<u64, ExecutionError>;

    /// Database named by the target, if any.
    fn database_name(&self, target: &str) -> Option<String> {
        let url = Url::parse(target).ok()?;
        let name = url.path().trim_matches('/');
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// A database connection pool per target URL, on sqlx's Any driver.
#[derive(Debug)]
pub struct SqlxBackend {
    pools: DashMap<String, AnyPool>,
    max_connections: u32,
}

impl SqlxBackend {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
            max_connections: 5,
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    async fn pool(&self, target: &str) -> Result<AnyPool, ExecutionError> {
        if let Some(pool) = self.pools.get(target) {
            return Ok(pool.clone());
        }
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(target)
            .await
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;
        info!(database = ?self.database_name(target), "connected");
        Ok(self.pools.entry(target.to_string()).or_insert(pool).clone())
    }
}

impl Default for SqlxBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::String(v) => query.bind(v.clone()),
            Value::Timestamp(ts) => query.bind(ts.format(crate::ast::TIMESTAMP_FORMATS[0]).to_string()),
            Value::Json(v) => query.bind(v.to_string()),
        };
    }
    query
}

#[async_trait]
impl QueryBackend for SqlxBackend {
    async fn open(&self, target: &str) -> Result<(), ExecutionError> {
        self.pool(target).await.map(|_| ())
    }

    async fn fetch(&self, target: &str, command: &str, params: &[Value]) -> Result<Vec<Record>, ExecutionError> {
        let pool = self.pool(target).await?;
        debug!(command, params = params.len(), "fetch");
        let rows: Vec<AnyRow> = bind_all(sqlx::query(command), params)
            .fetch_all(&pool)
            .await
            .map_err(|e| ExecutionError::Backend(e.to_string()))?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn execute(&self, target: &str, command: &str, params: &[Value]) -> Result<u64, ExecutionError> {
        let pool = self.pool(target).await?;
        debug!(command, params = params.len(), "execute");
        let result = bind_all(sqlx::query(command), params)
            .execute(&pool)
            .await
            .map_err(|e| ExecutionError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Convert an AnyRow to a record, keeping column order.
fn row_to_record(row: &AnyRow) -> Record {
    let mut record = Record::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name();

        let value = match type_name {
            "BOOL" | "BOOLEAN" => row
                .try_get::<Option<bool>, _>(i)
                .ok()
                .flatten()
                .map(Value::Bool),
            "INT2" | "INT4" | "INT8" | "INTEGER" | "BIGINT" | "SMALLINT" => row
                .try_get::<Option<i64>, _>(i)
                .ok()
                .flatten()
                .map(Value::Int),
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" => row
                .try_get::<Option<f64>, _>(i)
                .ok()
                .flatten()
                .map(Value::Float),
            _ => row
                .try_get::<Option<String>, _>(i)
                .ok()
                .flatten()
                .map(Value::String),
        };

        record.insert(name, value.unwrap_or(Value::Null));
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_name_from_target() {
        let backend = SqlxBackend::new();
        assert_eq!(
            backend.database_name("postgres://u:p@localhost:5432/app"),
            Some("app".to_string())
        );
        assert_eq!(backend.database_name("mysql://localhost"), None);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_a_connection_error() {
        let backend = SqlxBackend::new();
        let err = backend.open("nosuchdb://localhost/app").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Connection(_)));
    }
}
