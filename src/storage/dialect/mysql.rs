use super::{select_prefix, string_length, Dialect, DialectKind};
use crate::domain::schema::{FieldDefinition, FieldType};

/// MySQL / MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
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
            "{} LIMIT {}, {}",
            select_prefix(select, filter, order_by, table),
            start,
            end.saturating_sub(start)
        )
    }

    fn random_sql(&self, table: &str, sample_size: u64) -> String {
        format!("SELECT * FROM {} ORDER BY RAND() LIMIT {}", table, sample_size)
    }

    fn table_reference(&self, table: &str, index_hint: Option<&str>) -> String {
        match index_hint {
            Some(index) => format!("{} FORCE INDEX ({})", table, index),
            None => table.to_string(),
        }
    }

    fn column_type(&self, field: &FieldDefinition) -> String {
        match field.field_type {
            FieldType::Boolean => "BOOLEAN".to_string(),
            FieldType::Int => "INT".to_string(),
            FieldType::Long => "BIGINT".to_string(),
            FieldType::Double => "DOUBLE".to_string(),
            FieldType::String => format!("VARCHAR({})", string_length(field)),
            FieldType::Text => "MEDIUMTEXT".to_string(),
            FieldType::Datetime => "DATETIME".to_string(),
        }
    }

    fn auto_increment_key(&self, field: &FieldDefinition) -> String {
        format!("{} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY", field.name)
    }
}
