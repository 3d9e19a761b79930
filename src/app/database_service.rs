//! The database service.
//!
//! Owns the process-wide bindings every repository shares: the datastore, the
//! dialect, the key strategy, the table prefix and the catalog of table
//! definitions. It is responsible for:
//! 1.  Handing out [`Repository`] instances for logical table names.
//! 2.  Opening sessions (explicit transactions).
//! 3.  Table DDL: create and clear, driven by the dialect.

use crate::app::repository::Repository;
use crate::domain::schema::{ensure_identifier, FieldDefinition, SchemaCatalog};
use crate::error::RepositoryResult;
use crate::infra::config::Settings;
use crate::storage::dialect::{dialect_for, Dialect, DialectKind};
use crate::storage::executor::{Datastore, Session};
use crate::storage::keygen::{KeyGeneration, KeyGeneratorRegistry};
use crate::storage::sql::SqlDatastore;
use std::sync::Arc;
use tracing::{error, info};

pub struct DatabaseService {
    datastore: Arc<dyn Datastore>,
    dialect: &'static dyn Dialect,
    keys: KeyGeneration,
    table_prefix: String,
    catalog: Arc<SchemaCatalog>,
}

impl DatabaseService {
    /// Connects the pool and resolves the configured strategies. Unknown
    /// strategy names fail here, before anything is served.
    pub async fn connect(
        settings: &Settings,
        generators: &KeyGeneratorRegistry,
    ) -> RepositoryResult<Self> {
        let keys = KeyGeneration::resolve(&settings.key_generator, generators)?;
        let catalog = match &settings.schema_path {
            Some(path) => SchemaCatalog::load(path)?,
            None => SchemaCatalog::new(),
        };
        let datastore = SqlDatastore::connect(&settings.database_url, &settings.pool).await?;

        info!(
            engine = %settings.engine,
            keys = keys.name(),
            tables = catalog.table_names().len(),
            max_connections = settings.pool.max_connections,
            "Database service connected"
        );

        Ok(Self::new(Arc::new(datastore), settings.engine, keys)
            .with_table_prefix(settings.table_prefix.clone())
            .with_catalog(catalog))
    }

    pub fn new(datastore: Arc<dyn Datastore>, engine: DialectKind, keys: KeyGeneration) -> Self {
        Self {
            datastore,
            dialect: dialect_for(engine),
            keys,
            table_prefix: String::new(),
            catalog: Arc::new(SchemaCatalog::new()),
        }
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn keys(&self) -> &KeyGeneration {
        &self.keys
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn datastore(&self) -> Arc<dyn Datastore> {
        self.datastore.clone()
    }

    /// Physical table name for a logical one.
    pub fn table_name(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }

    /// Repository over the logical table `name`, typed by its catalog entry when
    /// there is one.
    pub fn repository(&self, name: &str) -> RepositoryResult<Repository> {
        ensure_identifier(name)?;
        let repository = Repository::new(
            self.table_name(name),
            self.datastore.clone(),
            self.dialect,
            self.keys.clone(),
        )?;
        Ok(match self.catalog.get(name) {
            Some(definition) => repository.with_definition(Arc::new(definition.clone())),
            None => repository,
        })
    }

    pub async fn begin(&self) -> RepositoryResult<Session> {
        self.datastore.begin().await
    }

    /// Round-trips a trivial statement.
    pub async fn ping(&self) -> RepositoryResult<()> {
        let mut conn = self.datastore.acquire().await?;
        conn.fetch_all("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Creates the logical table `name` if it does not exist. Failures are
    /// logged and reported as `false`.
    ///
    /// With store-delegated keys an integer key field becomes auto-increment.
    pub async fn create_table(&self, name: &str, fields: &[FieldDefinition]) -> bool {
        let mut fields = fields.to_vec();
        if self.keys.is_store_delegated() {
            for f in fields.iter_mut().filter(|f| f.is_key && f.field_type.is_integer()) {
                f.auto_increment = true;
            }
        }
        if let Err(e) = fields
            .iter()
            .try_for_each(|f| ensure_identifier(&f.name))
            .and_then(|_| ensure_identifier(name))
        {
            error!(table = name, error = %e, "Create table rejected");
            return false;
        }

        let table = self.table_name(name);
        let sql = self.dialect.create_table_sql(&table, &fields);
        match self.execute_ddl(&[sql]).await {
            Ok(()) => {
                info!(table = %table, "Table created");
                true
            }
            Err(e) => {
                error!(table = %table, error = %e, "Create table failed");
                false
            }
        }
    }

    /// Empties the logical table `name`, or drops it when `drop_first` is set.
    pub async fn clear_table(&self, name: &str, drop_first: bool) -> bool {
        if let Err(e) = ensure_identifier(name) {
            error!(table = name, error = %e, "Clear table rejected");
            return false;
        }
        let table = self.table_name(name);
        let statements = self.dialect.clear_table_sql(&table, drop_first);
        match self.execute_ddl(&statements).await {
            Ok(()) => {
                info!(table = %table, drop_first, "Table cleared");
                true
            }
            Err(e) => {
                error!(table = %table, drop_first, error = %e, "Clear table failed");
                false
            }
        }
    }

    /// Creates every catalog table, dropping each first when asked. Returns the
    /// outcome per logical table, in catalog order.
    pub async fn init_tables(&self, drop_first: bool) -> Vec<(String, bool)> {
        let mut outcome = Vec::new();
        for table in self.catalog.tables() {
            let cleared = !drop_first || self.clear_table(&table.name, true).await;
            let created = cleared && self.create_table(&table.name, &table.fields).await;
            outcome.push((table.name.clone(), created));
        }
        outcome
    }

    async fn execute_ddl(&self, statements: &[String]) -> RepositoryResult<()> {
        let mut conn = self.datastore.acquire().await?;
        for sql in statements {
            tracing::debug!("{sql}");
            conn.execute(sql, &[]).await?;
        }
        Ok(())
    }
}
