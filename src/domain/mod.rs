//! Domain types: records, filters, queries and table definitions.

pub mod filter;
pub mod query;
pub mod record;
pub mod schema;

pub use filter::{CompositeFilter, CompositeOperator, Filter, FilterOperator, PropertyFilter};
pub use query::{Pagination, Query, QueryResult, Sort, SortDirection};
pub use record::{Record, RecordId, DEFAULT_KEY_FIELD};
pub use schema::{FieldDefinition, FieldType, SchemaCatalog, TableDefinition};
