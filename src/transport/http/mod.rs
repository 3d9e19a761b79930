pub mod router;
pub mod types;
pub mod handlers {
    pub mod bootstrap;
    pub mod common;
    pub mod health;
    pub mod query;
    pub mod records;
}

pub use router::{create_router, ApiDoc};
pub use types::AppState;
