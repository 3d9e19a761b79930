use super::{select_prefix, string_length, Dialect, DialectKind, PlaceholderStyle};
use crate::domain::schema::{FieldDefinition, FieldType};

/// PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }

    fn query_page(
        &self,
        start: u64,
        end: u64,
        select: &str,
        filter: &str,
        order_by: &str,
        table: &str,
    ) -> String {
        format!(
            "{} LIMIT {} OFFSET {}",
            select_prefix(select, filter, order_by, table),
            end.saturating_sub(start),
            start
        )
    }

    fn random_sql(&self, table: &str, sample_size: u64) -> String {
        format!("SELECT * FROM {} ORDER BY RANDOM() LIMIT {}", table, sample_size)
    }

    fn column_type(&self, field: &FieldDefinition) -> String {
        match field.field_type {
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Int => "INTEGER".to_string(),
            FieldType::Long => "BIGINT".to_string(),
            FieldType::Double => "DOUBLE PRECISION".to_string(),
            FieldType::String => format!("VARCHAR({})", string_length(field)),
            FieldType::Text => "TEXT".to_string(),
            FieldType::Datetime => "TIMESTAMP".to_string(),
        }
    }

    fn auto_increment_key(&self, field: &FieldDefinition) -> String {
        format!("{} BIGSERIAL PRIMARY KEY", field.name)
    }

    fn returning_clause(&self, key_field: &str) -> Option<String> {
        Some(format!(" RETURNING {}", key_field))
    }

    fn clear_table_sql(&self, table: &str, drop_first: bool) -> Vec<String> {
        if drop_first {
            vec![format!("DROP TABLE IF EXISTS {} CASCADE", table)]
        } else {
            vec![format!("TRUNCATE TABLE {}", table)]
        }
    }
}
