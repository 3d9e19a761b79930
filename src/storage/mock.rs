//! Recording datastore for tests.
//!
//! Every statement is captured with its parameters; results come from a FIFO of
//! scripted responses. Row-returning calls with nothing scripted get no rows,
//! other calls get one affected row.

use crate::domain::record::Record;
use crate::error::{RepositoryError, RepositoryResult};
use crate::storage::executor::{Datastore, Execution, Executor, Session, TransactionExecutor};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<JsonValue>,
    /// Set when the statement ran inside a session.
    pub session: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(Vec<Record>),
    Affected(Execution),
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    statements: Vec<RecordedStatement>,
    responses: VecDeque<MockResponse>,
    acquired: usize,
    sessions_opened: usize,
    committed: Vec<usize>,
    rolled_back: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MockDatastore {
    state: Arc<Mutex<MockState>>,
}

impl MockDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_rows(&self, rows: Vec<Record>) {
        self.state.lock().await.responses.push_back(MockResponse::Rows(rows));
    }

    pub async fn push_affected(&self, rows_affected: u64, last_insert_id: Option<i64>) {
        self.state
            .lock()
            .await
            .responses
            .push_back(MockResponse::Affected(Execution {
                rows_affected,
                last_insert_id,
            }));
    }

    pub async fn push_failure(&self, message: impl Into<String>) {
        self.state
            .lock()
            .await
            .responses
            .push_back(MockResponse::Fail(message.into()));
    }

    pub async fn statements(&self) -> Vec<RecordedStatement> {
        self.state.lock().await.statements.clone()
    }

    pub async fn clear_statements(&self) {
        self.state.lock().await.statements.clear();
    }

    /// Number of connections checked out so far.
    pub async fn acquired(&self) -> usize {
        self.state.lock().await.acquired
    }

    pub async fn committed(&self) -> Vec<usize> {
        self.state.lock().await.committed.clone()
    }

    pub async fn rolled_back(&self) -> Vec<usize> {
        self.state.lock().await.rolled_back.clone()
    }

    async fn record(
        &self,
        sql: &str,
        params: &[JsonValue],
        session: Option<usize>,
    ) -> Option<MockResponse> {
        let mut state = self.state.lock().await;
        state.statements.push(RecordedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
            session,
        });
        state.responses.pop_front()
    }

    async fn fetch(
        &self,
        sql: &str,
        params: &[JsonValue],
        session: Option<usize>,
    ) -> RepositoryResult<Vec<Record>> {
        match self.record(sql, params, session).await {
            None => Ok(Vec::new()),
            Some(MockResponse::Rows(rows)) => Ok(rows),
            Some(MockResponse::Affected(_)) => Ok(Vec::new()),
            Some(MockResponse::Fail(message)) => Err(failure(message)),
        }
    }

    async fn run(
        &self,
        sql: &str,
        params: &[JsonValue],
        session: Option<usize>,
    ) -> RepositoryResult<Execution> {
        match self.record(sql, params, session).await {
            None | Some(MockResponse::Rows(_)) => Ok(Execution {
                rows_affected: 1,
                last_insert_id: None,
            }),
            Some(MockResponse::Affected(execution)) => Ok(execution),
            Some(MockResponse::Fail(message)) => Err(failure(message)),
        }
    }
}

fn failure(message: String) -> RepositoryError {
    RepositoryError::Persistence(sqlx::Error::Protocol(message))
}

struct MockExecutor {
    store: MockDatastore,
    session: Option<usize>,
}

#[async_trait]
impl Executor for MockExecutor {
    async fn fetch_all(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>> {
        self.store.fetch(sql, params, self.session).await
    }

    async fn execute(&mut self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Execution> {
        self.store.run(sql, params, self.session).await
    }
}

#[async_trait]
impl TransactionExecutor for MockExecutor {
    async fn commit(self: Box<Self>) -> RepositoryResult<()> {
        if let Some(id) = self.session {
            self.store.state.lock().await.committed.push(id);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepositoryResult<()> {
        if let Some(id) = self.session {
            self.store.state.lock().await.rolled_back.push(id);
        }
        Ok(())
    }
}

#[async_trait]
impl Datastore for MockDatastore {
    async fn acquire(&self) -> RepositoryResult<Box<dyn Executor>> {
        self.state.lock().await.acquired += 1;
        Ok(Box::new(MockExecutor {
            store: self.clone(),
            session: None,
        }))
    }

    async fn begin(&self) -> RepositoryResult<Session> {
        let id = {
            let mut state = self.state.lock().await;
            state.sessions_opened += 1;
            state.sessions_opened
        };
        Ok(Session::new(Box::new(MockExecutor {
            store: self.clone(),
            session: Some(id),
        })))
    }
}
