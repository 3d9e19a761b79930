pub mod compiler;
pub mod dialect;
pub mod executor;
pub mod keygen;
pub mod mock;
pub mod sql;

pub use compiler::{compile_filter, compile_order_by, compile_projection, Statement};
pub use dialect::{Dialect, DialectKind};
pub use executor::{Datastore, Execution, Executor, Session, TransactionExecutor};
pub use keygen::{
    KeyGeneration, KeyGenerator, KeyGeneratorRegistry, SequenceKeyGen, TimeOrderedKeyGen,
};
pub use mock::MockDatastore;
pub use sql::{PoolSettings, SqlDatastore};
