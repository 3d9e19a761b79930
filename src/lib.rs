pub mod app;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::database_service::DatabaseService;
pub use app::repository::Repository;
pub use domain::{
    Filter, FilterOperator, Pagination, Query, QueryResult, Record, RecordId, SortDirection,
};
pub use error::{RepositoryError, RepositoryResult};
pub use storage::{Datastore, Executor, KeyGeneration, Session};
