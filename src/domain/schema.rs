//! Table definitions used for DDL and for typing values read back from the store.

use crate::domain::record::DEFAULT_KEY_FIELD;
use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    Int,
    Long,
    Double,
    String,
    Text,
    Datetime,
}

impl FieldType {
    pub fn is_integer(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Long)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Column length for `string` fields.
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, rename = "iskey")]
    pub is_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

fn default_nullable() -> bool {
    true
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: None,
            nullable: true,
            is_key: false,
            auto_increment: false,
        }
    }

    pub fn key(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            nullable: false,
            is_key: true,
            ..Self::new(name, field_type)
        }
    }

    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn key_field(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.is_key)
            .map(|f| f.name.as_str())
            .unwrap_or(DEFAULT_KEY_FIELD)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        ensure_identifier(&self.name)?;
        if self.fields.is_empty() {
            return Err(RepositoryError::InvalidRecord(format!(
                "table '{}' defines no fields",
                self.name
            )));
        }
        for f in &self.fields {
            ensure_identifier(&f.name)?;
        }
        if self.fields.iter().filter(|f| f.is_key).count() > 1 {
            return Err(RepositoryError::InvalidRecord(format!(
                "table '{}' defines more than one key field",
                self.name
            )));
        }
        Ok(())
    }
}

/// The set of logical tables known at startup, keyed by logical (unprefixed) name.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    tables: HashMap<String, TableDefinition>,
    order: Vec<String>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    tables: Vec<TableDefinition>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(text: &str) -> RepositoryResult<Self> {
        let doc: CatalogDocument = serde_json::from_str(text)
            .map_err(|e| RepositoryError::Config(format!("invalid table definitions: {e}")))?;
        let mut catalog = Self::new();
        for table in doc.tables {
            catalog.register(table)?;
        }
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> RepositoryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RepositoryError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn register(&mut self, table: TableDefinition) -> RepositoryResult<()> {
        table.validate()?;
        if !self.tables.contains_key(&table.name) {
            self.order.push(table.name.clone());
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.order.iter().filter_map(|n| self.tables.get(n))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

pub fn is_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn ensure_identifier(ident: &str) -> RepositoryResult<()> {
    if is_identifier(ident) {
        Ok(())
    } else {
        Err(RepositoryError::InvalidIdentifier(ident.to_string()))
    }
}
