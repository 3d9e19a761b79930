use super::{select_prefix, Dialect, DialectKind};
use crate::domain::schema::{FieldDefinition, FieldType};

/// SQLite (3.35+ for `RETURNING`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
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

    fn table_reference(&self, table: &str, index_hint: Option<&str>) -> String {
        match index_hint {
            Some(index) => format!("{} INDEXED BY {}", table, index),
            None => table.to_string(),
        }
    }

    fn column_type(&self, field: &FieldDefinition) -> String {
        match field.field_type {
            FieldType::Boolean | FieldType::Int | FieldType::Long => "INTEGER",
            FieldType::Double => "REAL",
            FieldType::String | FieldType::Text | FieldType::Datetime => "TEXT",
        }
        .to_string()
    }

    fn auto_increment_key(&self, field: &FieldDefinition) -> String {
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", field.name)
    }

    fn returning_clause(&self, key_field: &str) -> Option<String> {
        Some(format!(" RETURNING {}", key_field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_page() {
        let sql = Sqlite.query_page(2, 4, "*", "(a = ? OR b = ?)", "name ASC", "item");
        assert_eq!(
            sql,
            "SELECT * FROM item WHERE (a = ? OR b = ?) ORDER BY name ASC LIMIT 2 OFFSET 2"
        );
    }

    #[test]
    fn test_random_and_hint() {
        assert_eq!(
            Sqlite.random_sql("item", 3),
            "SELECT * FROM item ORDER BY RANDOM() LIMIT 3"
        );
        assert_eq!(
            Sqlite.table_reference("item", Some("idx_name")),
            "item INDEXED BY idx_name"
        );
    }

    #[test]
    fn test_clear_table() {
        assert_eq!(Sqlite.clear_table_sql("item", false), vec!["DELETE FROM item"]);
        assert_eq!(
            Sqlite.clear_table_sql("item", true),
            vec!["DROP TABLE IF EXISTS item"]
        );
    }
}
