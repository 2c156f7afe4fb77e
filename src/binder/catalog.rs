//! Table metadata the binder resolves names against.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::DataType;
use crate::error::{WeaveError, WeaveResult};

/// Read-only schema lookup. Names are matched case-insensitively.
pub trait Catalog: Send + Sync {
    fn table(&self, name: &str) -> Option<TableMeta>;

    fn table_names(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnMeta>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
}

/// Catalog held in memory, usually loaded from a TOML file:
///
/// ```toml
/// [[tables]]
/// name = "users"
/// columns = [{ name = "id", type = "int" }, { name = "email", type = "text" }]
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: IndexMap<String, TableMeta>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    tables: Vec<TableMeta>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> WeaveResult<Self> {
        let file: CatalogFile = toml::from_str(text)
            .map_err(|e| WeaveError::config(format!("invalid catalog: {}", e)))?;
        let mut catalog = Self::new();
        for table in file.tables {
            catalog.insert(table);
        }
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> WeaveResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn insert(&mut self, table: TableMeta) {
        self.tables.insert(table.name.to_lowercase(), table);
    }

    /// Builder used by tests and embedders.
    pub fn with_table(mut self, name: &str, columns: &[(&str, DataType)]) -> Self {
        self.insert(TableMeta {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| ColumnMeta {
                    name: n.to_string(),
                    data_type: *t,
                })
                .collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, name: &str) -> Option<TableMeta> {
        self.tables.get(&name.to_lowercase()).cloned()
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.values().map(|t| t.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_toml() {
        let catalog = MemoryCatalog::from_toml_str(
            r#"
            [[tables]]
            name = "Users"
            columns = [{ name = "id", type = "integer" }, { name = "email", type = "varchar" }]

            [[tables]]
            name = "inbox"
            columns = [{ name = "body" }]
            "#,
        )
        .unwrap();
        assert_eq!(catalog.len(), 2);
        let users = catalog.table("users").unwrap();
        assert_eq!(users.name, "Users");
        assert_eq!(users.column("EMAIL").unwrap().data_type, DataType::Text);
        assert_eq!(users.column("id").unwrap().data_type, DataType::Int);
        let inbox = catalog.table("INBOX").unwrap();
        assert_eq!(inbox.columns[0].data_type, DataType::Unknown);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = MemoryCatalog::from_toml_str("tables = 3").unwrap_err();
        assert!(matches!(err, WeaveError::Config(_)));
    }
}
