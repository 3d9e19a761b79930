//! The repository engine: CRUD, differential update and paginated queries over
//! one logical table of schema-less records.
//!
//! Every operation comes in two forms. `op(..)` checks out a pooled connection
//! and auto-commits; `op_with(executor, ..)` runs on a caller-supplied
//! executor, typically a [`Session`](crate::storage::Session), so several
//! operations can share one transaction.

use crate::domain::filter::Filter;
use crate::domain::query::{page_count_for, Pagination, Query, QueryResult};
use crate::domain::record::{Record, RecordId, DEFAULT_KEY_FIELD};
use crate::domain::schema::{ensure_identifier, FieldType, TableDefinition};
use crate::error::{RepositoryError, RepositoryResult};
use crate::storage::compiler::{compile_filter, compile_order_by, compile_projection, Statement};
use crate::storage::dialect::Dialect;
use crate::storage::executor::{Datastore, Execution, Executor};
use crate::storage::keygen::KeyGeneration;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Repository {
    table: String,
    key_field: String,
    definition: Option<Arc<TableDefinition>>,
    datastore: Arc<dyn Datastore>,
    dialect: &'static dyn Dialect,
    keys: KeyGeneration,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.table)
            .field("key_field", &self.key_field)
            .field("dialect", &self.dialect.kind())
            .field("keys", &self.keys.name())
            .finish()
    }
}

impl Repository {
    /// Repository over the physical table `table`, keyed by `id`.
    pub fn new(
        table: impl Into<String>,
        datastore: Arc<dyn Datastore>,
        dialect: &'static dyn Dialect,
        keys: KeyGeneration,
    ) -> RepositoryResult<Self> {
        let table = table.into();
        ensure_identifier(&table)?;
        Ok(Self {
            table,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            definition: None,
            datastore,
            dialect,
            keys,
        })
    }

    /// Attaches a table definition: its key field replaces `id` and its field
    /// types are used to coerce ids and values read back from the store.
    pub fn with_definition(mut self, definition: Arc<TableDefinition>) -> Self {
        self.key_field = definition.key_field().to_string();
        self.definition = Some(definition);
        self
    }

    pub fn with_key_field(mut self, key_field: impl Into<String>) -> RepositoryResult<Self> {
        let key_field = key_field.into();
        ensure_identifier(&key_field)?;
        self.key_field = key_field;
        Ok(self)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn definition(&self) -> Option<&TableDefinition> {
        self.definition.as_deref()
    }

    /// Parses an id received as text (a URL segment, say) against the key field type.
    pub fn parse_id(&self, raw: &str) -> RecordId {
        let integer_key = match self.key_type() {
            Some(t) => t.is_integer(),
            None => self.keys.is_store_delegated(),
        };
        match raw.trim().parse::<i64>() {
            Ok(i) if integer_key => RecordId::Int(i),
            _ => RecordId::Text(raw.to_string()),
        }
    }

    // ----- add -----

    pub async fn add(&self, record: &mut Record) -> RepositoryResult<Option<RecordId>> {
        let mut conn = self.datastore.acquire().await?;
        self.add_with(conn.as_mut(), record).await
    }

    /// Inserts `record`, attaching the id used to it.
    ///
    /// A record that already carries an id is inserted as is. Otherwise the key
    /// strategy generates one, or, when keys are store-delegated, the key field
    /// is left out of the INSERT and the assigned value is read back.
    pub async fn add_with(
        &self,
        exec: &mut dyn Executor,
        record: &mut Record,
    ) -> RepositoryResult<Option<RecordId>> {
        let supplied = record.id(&self.key_field).map(|id| self.coerce_id(&id));
        let delegated = supplied.is_none() && self.keys.is_store_delegated();

        let id = match supplied {
            Some(id) => Some(id),
            None if delegated => {
                record.remove(&self.key_field);
                None
            }
            None => self.keys.next_key().map(|id| self.coerce_id(&id)),
        };
        if let Some(id) = &id {
            record.set_id(&self.key_field, id);
        }

        let mut columns = Vec::with_capacity(record.len());
        let mut params = Vec::with_capacity(record.len());
        for (field, value) in record.fields() {
            ensure_identifier(field)?;
            columns.push(field.as_str());
            params.push(value.clone());
        }
        if columns.is_empty() {
            return Err(RepositoryError::InvalidRecord(format!(
                "nothing to insert into '{}'",
                self.table
            )));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        if !delegated {
            self.run(exec, &sql, &params).await?;
            return Ok(id);
        }

        let assigned = match self.dialect.returning_clause(&self.key_field) {
            Some(returning) => {
                sql.push_str(&returning);
                let rows = self.fetch(exec, &sql, &params).await?;
                rows.first().and_then(|row| row.id(&self.key_field))
            }
            None => self
                .run(exec, &sql, &params)
                .await?
                .last_insert_id
                .map(RecordId::Int),
        };
        if let Some(id) = &assigned {
            record.set_id(&self.key_field, id);
        }
        Ok(assigned)
    }

    // ----- update -----

    pub async fn update(&self, id: &RecordId, record: &Record) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.update_with(conn.as_mut(), id, record).await
    }

    /// Differential update: reads the stored record and writes only the fields
    /// that changed. Returns the rows affected; 0 with no statement when nothing
    /// changed.
    pub async fn update_with(
        &self,
        exec: &mut dyn Executor,
        id: &RecordId,
        record: &Record,
    ) -> RepositoryResult<u64> {
        let stored = self.get_with(exec, id).await?;
        let changed: Vec<(&str, &JsonValue)> = match &stored {
            Some(old) => changed_fields(old, record, &self.key_field),
            None => {
                warn!(table = %self.table, id = %id, "update of missing record writes every field");
                record
                    .fields()
                    .filter(|(field, _)| field.as_str() != self.key_field)
                    .map(|(field, value)| (field.as_str(), value))
                    .collect()
            }
        };

        if changed.is_empty() {
            debug!(table = %self.table, id = %id, "update is a no-op");
            return Ok(0);
        }
        self.write_fields(exec, id, changed).await
    }

    pub async fn update_fields(
        &self,
        id: &RecordId,
        record: &Record,
        fields: &[&str],
    ) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.update_fields_with(conn.as_mut(), id, record, fields).await
    }

    /// Writes exactly `fields` from `record` without reading the stored row.
    /// A named field absent from `record` is written as null.
    pub async fn update_fields_with(
        &self,
        exec: &mut dyn Executor,
        id: &RecordId,
        record: &Record,
        fields: &[&str],
    ) -> RepositoryResult<u64> {
        let changed: Vec<(&str, &JsonValue)> = fields
            .iter()
            .filter(|field| **field != self.key_field)
            .map(|field| (*field, record.get(field).unwrap_or(&JsonValue::Null)))
            .collect();
        if changed.is_empty() {
            return Ok(0);
        }
        self.write_fields(exec, id, changed).await
    }

    async fn write_fields(
        &self,
        exec: &mut dyn Executor,
        id: &RecordId,
        changed: Vec<(&str, &JsonValue)>,
    ) -> RepositoryResult<u64> {
        let mut assignments = Vec::with_capacity(changed.len());
        let mut params = Vec::with_capacity(changed.len() + 1);
        for (field, value) in changed {
            ensure_identifier(field)?;
            assignments.push(format!("{field} = ?"));
            params.push(value.clone());
        }
        params.push(self.key_param(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table,
            assignments.join(", "),
            self.key_field
        );
        Ok(self.run(exec, &sql, &params).await?.rows_affected)
    }

    // ----- remove -----

    pub async fn remove(&self, id: &RecordId) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.remove_with(conn.as_mut(), id).await
    }

    /// Deletes by id. Removing a missing record is not an error.
    pub async fn remove_with(&self, exec: &mut dyn Executor, id: &RecordId) -> RepositoryResult<u64> {
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table, self.key_field);
        Ok(self.run(exec, &sql, &[self.key_param(id)]).await?.rows_affected)
    }

    pub async fn remove_matching(&self, filter: &Filter) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.remove_matching_with(conn.as_mut(), filter).await
    }

    pub async fn remove_matching_with(
        &self,
        exec: &mut dyn Executor,
        filter: &Filter,
    ) -> RepositoryResult<u64> {
        let compiled = compile_filter(filter)?;
        let sql = format!("DELETE FROM {} WHERE {}", self.table, compiled.sql);
        Ok(self.run(exec, &sql, &compiled.params).await?.rows_affected)
    }

    // ----- reads -----

    pub async fn get(&self, id: &RecordId) -> RepositoryResult<Option<Record>> {
        let mut conn = self.datastore.acquire().await?;
        self.get_with(conn.as_mut(), id).await
    }

    pub async fn get_with(
        &self,
        exec: &mut dyn Executor,
        id: &RecordId,
    ) -> RepositoryResult<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?", self.table, self.key_field);
        let rows = self.fetch(exec, &sql, &[self.key_param(id)]).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn get_many(&self, ids: &[RecordId]) -> RepositoryResult<HashMap<RecordId, Record>> {
        let mut conn = self.datastore.acquire().await?;
        self.get_many_with(conn.as_mut(), ids).await
    }

    /// One fetch per id; ids with no stored record are left out of the map.
    pub async fn get_many_with(
        &self,
        exec: &mut dyn Executor,
        ids: &[RecordId],
    ) -> RepositoryResult<HashMap<RecordId, Record>> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            if found.contains_key(id) {
                continue;
            }
            if let Some(record) = self.get_with(exec, id).await? {
                found.insert(id.clone(), record);
            }
        }
        Ok(found)
    }

    pub async fn has(&self, id: &RecordId) -> RepositoryResult<bool> {
        let mut conn = self.datastore.acquire().await?;
        self.has_with(conn.as_mut(), id).await
    }

    pub async fn has_with(&self, exec: &mut dyn Executor, id: &RecordId) -> RepositoryResult<bool> {
        let statement = Statement::new(
            format!("{} = ?", self.key_field),
            vec![self.key_param(id)],
        );
        Ok(self.count_where(exec, &statement).await? > 0)
    }

    pub async fn count(&self) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.count_with(conn.as_mut()).await
    }

    pub async fn count_with(&self, exec: &mut dyn Executor) -> RepositoryResult<u64> {
        self.count_where(exec, &Statement::default()).await
    }

    pub async fn count_matching(&self, query: &Query) -> RepositoryResult<u64> {
        let mut conn = self.datastore.acquire().await?;
        self.count_matching_with(conn.as_mut(), query).await
    }

    /// Counts the rows matching the query's filter; sorts and paging are ignored.
    pub async fn count_matching_with(
        &self,
        exec: &mut dyn Executor,
        query: &Query,
    ) -> RepositoryResult<u64> {
        let filter = compile_optional(query.filter.as_ref())?;
        self.count_where(exec, &filter).await
    }

    pub async fn get_by_query(&self, query: &Query) -> RepositoryResult<QueryResult> {
        let mut conn = self.datastore.acquire().await?;
        self.get_by_query_with(conn.as_mut(), query).await
    }

    /// Runs a paginated query.
    ///
    /// Without a caller-supplied page count a COUNT runs first; when it finds
    /// nothing the page query is skipped.
    pub async fn get_by_query_with(
        &self,
        exec: &mut dyn Executor,
        query: &Query,
    ) -> RepositoryResult<QueryResult> {
        query.validate()?;
        let filter = compile_optional(query.filter.as_ref())?;
        let order_by = compile_order_by(&query.sorts)?;
        let select = compile_projection(&query.projections, &self.key_field)?;
        if let Some(hint) = &query.index_hint {
            ensure_identifier(hint)?;
        }

        let pagination = match query.page_count {
            Some(page_count) => Pagination {
                page_count,
                record_count: 0,
            },
            None => {
                let record_count = self.count_where(exec, &filter).await?;
                Pagination {
                    page_count: page_count_for(record_count, query.page_size),
                    record_count,
                }
            }
        };
        if pagination.page_count == 0 {
            return Ok(QueryResult::empty(pagination));
        }

        let (start, end) = query.window();
        let table = self
            .dialect
            .table_reference(&self.table, query.index_hint.as_deref());
        let sql = self
            .dialect
            .query_page(start, end, &select, &filter.sql, &order_by, &table);
        let rows = self.fetch(exec, &sql, &filter.params).await?;
        Ok(QueryResult { pagination, rows })
    }

    pub async fn get_list(&self, query: &Query) -> RepositoryResult<Vec<Record>> {
        Ok(self.get_by_query(query).await?.rows)
    }

    pub async fn get_list_with(
        &self,
        exec: &mut dyn Executor,
        query: &Query,
    ) -> RepositoryResult<Vec<Record>> {
        Ok(self.get_by_query_with(exec, query).await?.rows)
    }

    pub async fn get_first(&self, query: &Query) -> RepositoryResult<Option<Record>> {
        let mut conn = self.datastore.acquire().await?;
        self.get_first_with(conn.as_mut(), query).await
    }

    /// First row of the query's ordering, without a COUNT.
    pub async fn get_first_with(
        &self,
        exec: &mut dyn Executor,
        query: &Query,
    ) -> RepositoryResult<Option<Record>> {
        let first = Query {
            page_num: 1,
            page_size: 1,
            page_count: Some(1),
            ..query.clone()
        };
        Ok(self.get_by_query_with(exec, &first).await?.rows.into_iter().next())
    }

    pub async fn get_randomly(&self, sample_size: u64) -> RepositoryResult<Vec<Record>> {
        let mut conn = self.datastore.acquire().await?;
        self.get_randomly_with(conn.as_mut(), sample_size).await
    }

    pub async fn get_randomly_with(
        &self,
        exec: &mut dyn Executor,
        sample_size: u64,
    ) -> RepositoryResult<Vec<Record>> {
        if sample_size == 0 {
            return Ok(Vec::new());
        }
        let sql = self.dialect.random_sql(&self.table, sample_size);
        self.fetch(exec, &sql, &[]).await
    }

    /// Raw SELECT passthrough. `sql` uses `?` placeholders like every other
    /// statement; rows are marshalled the same way.
    pub async fn select(&self, sql: &str, params: &[JsonValue]) -> RepositoryResult<Vec<Record>> {
        let mut conn = self.datastore.acquire().await?;
        self.select_with(conn.as_mut(), sql, params).await
    }

    pub async fn select_with(
        &self,
        exec: &mut dyn Executor,
        sql: &str,
        params: &[JsonValue],
    ) -> RepositoryResult<Vec<Record>> {
        self.fetch(exec, sql, params).await
    }

    // ----- plumbing -----

    async fn count_where(&self, exec: &mut dyn Executor, filter: &Statement) -> RepositoryResult<u64> {
        let mut sql = format!("SELECT COUNT({}) AS cnt FROM {}", self.key_field, self.table);
        if !filter.sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.sql);
        }
        let rows = self.fetch(exec, &sql, &filter.params).await?;
        let count = rows.first().and_then(|row| row.get_i64("cnt"));
        count
            .and_then(|count| u64::try_from(count).ok())
            .ok_or_else(|| {
                RepositoryError::Persistence(sqlx::Error::Protocol(format!(
                    "COUNT on {} returned no readable 'cnt' value",
                    self.table
                )))
            })
    }

    async fn fetch(
        &self,
        exec: &mut dyn Executor,
        sql: &str,
        params: &[JsonValue],
    ) -> RepositoryResult<Vec<Record>> {
        let sql = self.dialect.render(sql);
        debug!(table = %self.table, params = params.len(), "{sql}");
        let rows = exec.fetch_all(&sql, params).await?;
        Ok(rows.into_iter().map(|row| self.normalize(row)).collect())
    }

    async fn run(
        &self,
        exec: &mut dyn Executor,
        sql: &str,
        params: &[JsonValue],
    ) -> RepositoryResult<Execution> {
        let sql = self.dialect.render(sql);
        debug!(table = %self.table, params = params.len(), "{sql}");
        exec.execute(&sql, params).await
    }

    fn key_type(&self) -> Option<FieldType> {
        self.definition
            .as_ref()
            .and_then(|d| d.field(&self.key_field))
            .map(|f| f.field_type)
    }

    /// Converts an id to the representation of the key column, when known.
    fn coerce_id(&self, id: &RecordId) -> RecordId {
        match (self.key_type(), id) {
            (Some(t), RecordId::Text(s)) if t.is_integer() => s
                .trim()
                .parse()
                .map(RecordId::Int)
                .unwrap_or_else(|_| id.clone()),
            (Some(FieldType::String | FieldType::Text), RecordId::Int(i)) => {
                RecordId::Text(i.to_string())
            }
            _ => id.clone(),
        }
    }

    fn key_param(&self, id: &RecordId) -> JsonValue {
        self.coerce_id(id).to_json()
    }

    /// Restores typed values for engines that return booleans as integers and
    /// wide integers as text.
    fn normalize(&self, mut row: Record) -> Record {
        let Some(definition) = &self.definition else {
            return row;
        };
        for field in &definition.fields {
            let value = match field.field_type {
                FieldType::Boolean if !row.is_null(&field.name) => row.get_bool(&field.name).map(JsonValue::from),
                FieldType::Int | FieldType::Long => match row.get(&field.name) {
                    Some(JsonValue::String(_)) => row.get_i64(&field.name).map(JsonValue::from),
                    _ => None,
                },
                _ => None,
            };
            if let Some(value) = value {
                row.set(field.name.clone(), value);
            }
        }
        row
    }
}

fn compile_optional(filter: Option<&Filter>) -> RepositoryResult<Statement> {
    match filter {
        Some(filter) => compile_filter(filter),
        None => Ok(Statement::default()),
    }
}

/// Canonical text of a value for change detection; `None` for null.
///
/// Booleans compare as `1`/`0` and integral floats as integers, since engines
/// without a boolean type hand both back as plain integers.
fn canonical_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some((f as i64).to_string())
            }
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Fields of `new` that must be written over `old`: those whose canonical text
/// differs, plus explicit nulls over null or absent values. The key field is
/// never included.
fn changed_fields<'a>(old: &Record, new: &'a Record, key_field: &str) -> Vec<(&'a str, &'a JsonValue)> {
    new.fields()
        .filter(|(field, _)| field.as_str() != key_field)
        .filter(|(field, value)| {
            let before = old.get(field).and_then(canonical_text);
            let after = canonical_text(value);
            match (before, after) {
                (None, None) => true,
                (before, after) => before != after,
            }
        })
        .map(|(field, value)| (field.as_str(), value))
        .collect()
}
