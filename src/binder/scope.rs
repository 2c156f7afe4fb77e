//! Name scopes used while binding.

use crate::ast::{Binding, DataType, Resolution};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Where a FROM source's rows come from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Origin {
    Table(String),
    Cte(String),
    Derived,
}

/// One source visible in a FROM clause.
#[derive(Debug, Clone)]
pub(crate) struct SourceEntry {
    /// Alias, or the table name when there is none.
    pub name: String,
    pub origin: Origin,
    pub columns: Vec<ColumnInfo>,
}

impl SourceEntry {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn resolve(&self, column: &ColumnInfo) -> Resolution {
        let binding = match &self.origin {
            Origin::Table(table) => Binding::Column {
                source: self.name.clone(),
                table: table.clone(),
                column: column.name.clone(),
            },
            Origin::Cte(cte) => Binding::CteColumn {
                cte: cte.clone(),
                column: column.name.clone(),
            },
            Origin::Derived => Binding::Derived {
                source: self.name.clone(),
                column: column.name.clone(),
            },
        };
        Resolution {
            binding,
            data_type: column.data_type,
        }
    }
}

/// Sources of one query level. Outer levels stay reachable for correlated
/// subqueries.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub sources: Vec<SourceEntry>,
    /// Projection aliases, visible to ORDER BY only.
    pub aliases: Vec<ColumnInfo>,
}

impl Scope {
    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Sources that have a column with this name.
    pub fn sources_with(&self, column: &str) -> Vec<&SourceEntry> {
        self.sources
            .iter()
            .filter(|s| s.column(column).is_some())
            .collect()
    }

    pub fn describe(&self) -> String {
        let names: Vec<_> = self.sources.iter().map(|s| s.name.as_str()).collect();
        if names.is_empty() {
            "no sources".to_string()
        } else {
            names.join(", ")
        }
    }
}

/// A CTE visible to the statement being bound.
#[derive(Debug, Clone)]
pub(crate) struct CteEntry {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}
