//! sqlx-backed datastore.
//!
//! Runs on the `Any` driver so MySQL, PostgreSQL and SQLite share one code path;
//! the dialect decides the SQL shape, this module only binds values and turns
//! rows back into records.

use crate::domain::record::Record;
use crate::error::RepositoryResult;
use crate::storage::executor::{Datastore, Execution, Executor, Session, TransactionExecutor};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::database::HasArguments;
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyConnection, AnyPool, Column, Row, Transaction, TypeInfo, ValueRef};
use std::time::Duration;

type AnyQuery<'q> = Query<'q, Any, <Any as HasArguments<'q>>::Arguments>;

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Pooled connection source for one database.
#[derive(Debug, Clone)]
pub struct SqlDatastore {
    pool: AnyPool,
}

impl SqlDatastore {
    pub async fn connect(url: &str, settings: &PoolSettings) -> RepositoryResult<Self> {
        sqlx::any::install_default_drivers();
        let mut options = AnyPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout);
        // An in-memory SQLite database lives and dies with its connection.
        if url.contains(":memory:") {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl Datastore for SqlDatastore {
    async fn acquire(&self) -> RepositoryResult<Box<dyn Executor>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PooledExecutor { conn }))
    }

    async fn begin(&self) -> RepositoryResult<Session> {
        let tx = self.pool.begin().await?;
        Ok(Session::new(Box::new(SqlTransaction { tx })))
    }
}

struct PooledExecutor {
    conn: PoolConnection<Any>,
}

#[async_trait]
impl Executor for PooledExecutor {
    async fn fetch_all(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>> {
        fetch_all_on(&mut self.conn, sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Execution> {
        execute_on(&mut self.conn, sql, params).await
    }
}

struct SqlTransaction {
    tx: Transaction<'static, Any>,
}

#[async_trait]
impl Executor for SqlTransaction {
    async fn fetch_all(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>> {
        fetch_all_on(&mut self.tx, sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Execution> {
        execute_on(&mut self.tx, sql, params).await
    }
}

#[async_trait]
impl TransactionExecutor for SqlTransaction {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn fetch_all_on(
    conn: &mut AnyConnection,
    sql: &str,
    params: &[JsonValue],
) -> RepositoryResult<Vec<Record>> {
    let rows = bind_params(sqlx::query(sql), params)
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_record).collect()
}

async fn execute_on(
    conn: &mut AnyConnection,
    sql: &str,
    params: &[JsonValue],
) -> RepositoryResult<Execution> {
    let result = bind_params(sqlx::query(sql), params)
        .execute(&mut *conn)
        .await?;
    Ok(Execution {
        rows_affected: result.rows_affected(),
        last_insert_id: result.last_insert_id(),
    })
}

fn bind_params<'q>(mut query: AnyQuery<'q>, params: &[JsonValue]) -> AnyQuery<'q> {
    for value in params {
        query = match value {
            JsonValue::Null => query.bind(None::<String>),
            JsonValue::Bool(b) => query.bind(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(f) = n.as_f64() {
                    query.bind(f)
                } else {
                    query.bind(n.to_string())
                }
            }
            JsonValue::String(s) => query.bind(s.clone()),
            // Objects and arrays are stored as their JSON text.
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn row_to_record(row: &AnyRow) -> RepositoryResult<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal())?;
        record.set(column.name(), value);
    }
    Ok(record)
}

/// Decodes one column by trying the `Any` value kinds in turn.
fn decode_column(row: &AnyRow, index: usize) -> RepositoryResult<JsonValue> {
    // SQLite nulls come through `Any` with a NULL type but a non-null value flag.
    let raw = row.try_get_raw(index)?;
    if raw.is_null() || raw.type_info().is_null() {
        return Ok(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(JsonValue::from(v));
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Ok(JsonValue::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null));
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Ok(JsonValue::from(v));
    }
    match row.try_get::<String, _>(index) {
        Ok(v) => Ok(JsonValue::from(v)),
        Err(text_err) => match row.try_get::<Vec<u8>, _>(index) {
            Ok(bytes) => Ok(JsonValue::from(String::from_utf8_lossy(&bytes).into_owned())),
            Err(_) => Err(text_err.into()),
        },
    }
}
