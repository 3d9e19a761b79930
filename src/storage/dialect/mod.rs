//! Database dialect strategies.
//!
//! Each supported engine gets one unit struct implementing [`Dialect`]; the
//! instances are `'static` and shared by every table in the process. The engine
//! code never assumes a particular pagination or random-sampling grammar.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use crate::domain::schema::FieldDefinition;
use crate::error::{RepositoryError, RepositoryResult};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    MySql,
    Postgres,
    Sqlite,
}

impl DialectKind {
    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::MySql => "mysql",
            DialectKind::Postgres => "postgres",
            DialectKind::Sqlite => "sqlite",
        }
    }

    /// Infers the engine from a connection URL scheme (`postgres://…`, `sqlite::memory:`).
    pub fn from_url(url: &str) -> RepositoryResult<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        scheme.parse()
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            _ => Err(RepositoryError::unresolved("dialect", s)),
        }
    }
}

static MYSQL: MySql = MySql;
static POSTGRES: Postgres = Postgres;
static SQLITE: Sqlite = Sqlite;

/// Resolves the process-wide dialect instance for an engine.
pub fn dialect_for(kind: DialectKind) -> &'static dyn Dialect {
    match kind {
        DialectKind::MySql => &MYSQL,
        DialectKind::Postgres => &POSTGRES,
        DialectKind::Sqlite => &SQLITE,
    }
}

/// Resolves a configured engine name; unknown names are fatal at startup.
pub fn resolve(name: &str) -> RepositoryResult<&'static dyn Dialect> {
    Ok(dialect_for(name.parse()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    Question,
    /// `$1`, `$2`, … (PostgreSQL)
    Numbered,
}

pub trait Dialect: Send + Sync + fmt::Debug {
    fn kind(&self) -> DialectKind;

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    /// Bounded SELECT over the half-open row window `[start, end)`.
    ///
    /// `filter` and `order_by` are bare clause bodies and may be empty.
    fn query_page(
        &self,
        start: u64,
        end: u64,
        select: &str,
        filter: &str,
        order_by: &str,
        table: &str,
    ) -> String;

    /// SELECT returning up to `sample_size` random rows.
    fn random_sql(&self, table: &str, sample_size: u64) -> String;

    /// Table reference carrying an optional index hint. Engines without hints
    /// return the bare name.
    fn table_reference(&self, table: &str, _index_hint: Option<&str>) -> String {
        table.to_string()
    }

    /// Column type for a field definition.
    fn column_type(&self, field: &FieldDefinition) -> String;

    /// Column definition for a store-assigned integer key.
    fn auto_increment_key(&self, field: &FieldDefinition) -> String;

    /// Clause appended to an INSERT to read back a store-assigned key, when the
    /// engine supports it.
    fn returning_clause(&self, _key_field: &str) -> Option<String> {
        None
    }

    fn create_table_sql(&self, table: &str, fields: &[FieldDefinition]) -> String {
        let mut columns = Vec::with_capacity(fields.len());
        for f in fields {
            if f.is_key && f.auto_increment {
                columns.push(self.auto_increment_key(f));
                continue;
            }
            let mut col = format!("{} {}", f.name, self.column_type(f));
            if !f.nullable || f.is_key {
                col.push_str(" NOT NULL");
            }
            if f.is_key {
                col.push_str(" PRIMARY KEY");
            }
            columns.push(col);
        }
        format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns.join(", "))
    }

    /// Statements that empty a table; with `drop_first` the table is dropped
    /// instead so it can be recreated from its definition.
    fn clear_table_sql(&self, table: &str, drop_first: bool) -> Vec<String> {
        if drop_first {
            vec![format!("DROP TABLE IF EXISTS {}", table)]
        } else {
            vec![format!("DELETE FROM {}", table)]
        }
    }

    /// Rewrites `?` placeholders into the engine's native style. Question marks
    /// inside quoted literals or identifiers are left alone.
    fn render(&self, sql: &str) -> String {
        match self.placeholder_style() {
            PlaceholderStyle::Question => sql.to_string(),
            PlaceholderStyle::Numbered => number_placeholders(sql),
        }
    }
}

/// Shared `SELECT … FROM … [WHERE …] [ORDER BY …]` prefix used by the page builders.
pub(crate) fn select_prefix(select: &str, filter: &str, order_by: &str, table: &str) -> String {
    let mut sql = format!("SELECT {} FROM {}", select, table);
    if !filter.trim().is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if !order_by.trim().is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

pub(crate) fn string_length(field: &FieldDefinition) -> u32 {
    field.length.unwrap_or(255)
}

fn number_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) => {
                // A doubled quote closes and reopens, which leaves the state unchanged.
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(c),
            },
        }
    }
    out
}
