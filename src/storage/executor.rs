//! Execution seams between the repository engine and a concrete store.
//!
//! An [`Executor`] runs already-rendered SQL. A [`Datastore`] hands out one
//! executor per logical operation (auto-commit) or opens a [`Session`], an
//! explicit transaction that multi-step operations pass around.

use crate::domain::record::Record;
use crate::error::RepositoryResult;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Execution {
    pub rows_affected: u64,
    /// Key assigned by the store to the last inserted row, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

#[async_trait]
pub trait Executor: Send {
    async fn fetch_all(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>>;

    async fn execute(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Execution>;
}

/// Executor that can end the transaction it runs in.
#[async_trait]
pub trait TransactionExecutor: Executor {
    async fn commit(self: Box<Self>) -> RepositoryResult<()>;

    async fn rollback(self: Box<Self>) -> RepositoryResult<()>;
}

#[async_trait]
pub trait Datastore: Send + Sync {
    /// Checks out a connection for a single auto-committed operation. The
    /// connection returns to the pool when the executor is dropped.
    async fn acquire(&self) -> RepositoryResult<Box<dyn Executor>>;

    /// Opens a transaction.
    async fn begin(&self) -> RepositoryResult<Session>;
}

/// An open transaction.
///
/// Pass it to the `*_with` repository operations to group them atomically.
/// Nothing is visible to other connections until [`Session::commit`]; dropping
/// the session without committing rolls it back.
pub struct Session {
    inner: Box<dyn TransactionExecutor>,
}

impl Session {
    pub fn new(inner: Box<dyn TransactionExecutor>) -> Self {
        Self { inner }
    }

    pub async fn commit(self) -> RepositoryResult<()> {
        self.inner.commit().await
    }

    pub async fn rollback(self) -> RepositoryResult<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl Executor for Session {
    async fn fetch_all(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>> {
        self.inner.fetch_all(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Execution> {
        self.inner.execute(sql, params).await
    }
}
