//! Transpiler traits and utilities.

use crate::ast::{JoinKind, OverClause, TableHint};
use crate::error::UnsupportedFeatureError;
use crate::transpiler::Dialect;

/// SQL reserved words that must be quoted when used as identifiers.
pub const RESERVED_WORDS: &[&str] = &[
    "order",
    "group",
    "user",
    "table",
    "select",
    "from",
    "where",
    "join",
    "left",
    "right",
    "inner",
    "outer",
    "full",
    "cross",
    "on",
    "and",
    "or",
    "not",
    "null",
    "true",
    "false",
    "limit",
    "offset",
    "top",
    "as",
    "in",
    "is",
    "like",
    "between",
    "having",
    "union",
    "all",
    "distinct",
    "case",
    "when",
    "then",
    "else",
    "end",
    "with",
    "create",
    "alter",
    "drop",
    "insert",
    "update",
    "delete",
    "index",
    "key",
    "primary",
    "foreign",
    "references",
    "default",
    "constraint",
    "check",
    "over",
    "partition",
    "range",
    "rows",
];

/// True when a single identifier part is a reserved word or contains
/// characters a bare identifier cannot.
pub fn needs_quoting(name: &str) -> bool {
    let lower = name.to_lowercase();
    RESERVED_WORDS.contains(&lower.as_str())
        || name.is_empty()
        || name.chars().any(|c| !c.is_alphanumeric() && c != '_')
        || name.chars().next().map(|c| c.is_numeric()).unwrap_or(false)
}

/// How a dialect spells a DELETE that reaches other relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStyle {
    /// `DELETE FROM t USING r WHERE .. RETURNING ..`
    Using,
    /// `DELETE t FROM t JOIN r ..`, no output clause
    Joined,
    /// `DELETE t OUTPUT DELETED.c FROM t JOIN r ..`
    Output,
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;
    /// Quote an identifier part (table, column or alias) if it needs it.
    fn quote_identifier(&self, name: &str) -> String;
    /// Generate the parameter placeholder (e.g., $1, ?, @p1) for a given index.
    fn placeholder(&self, index: usize) -> String;
    /// Generate string concatenation expression (e.g. a || b vs CONCAT(a, b)).
    fn string_concat(&self, parts: &[&str]) -> String;

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }
        sql
    }

    /// Whether a plain SELECT takes its row limit as `TOP (n)`.
    fn uses_top(&self) -> bool {
        false
    }

    /// Keyword written after WITH for recursive chains.
    fn recursive_keyword(&self) -> &'static str {
        "RECURSIVE "
    }

    fn join_keyword(&self, kind: JoinKind) -> Result<&'static str, UnsupportedFeatureError> {
        Ok(match kind {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Right => " RIGHT JOIN ",
            JoinKind::Full => " FULL JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
            JoinKind::Comma => ", ",
        })
    }

    /// Render table hints, leading space included.
    fn table_hints(&self, hints: &[TableHint]) -> Result<String, UnsupportedFeatureError>;

    /// Reject window frames the backend cannot evaluate.
    fn check_frame(&self, _over: &OverClause) -> Result<(), UnsupportedFeatureError> {
        Ok(())
    }

    fn delete_style(&self) -> DeleteStyle;

    fn unsupported(&self, feature: &str) -> UnsupportedFeatureError {
        UnsupportedFeatureError::new(feature, self.dialect())
    }
}

/// Hint arguments: numbers stay bare, names are quoted as needed.
pub(crate) fn hint_args(generator: &dyn SqlGenerator, args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.chars().all(|c| c.is_ascii_digit()) {
                a.clone()
            } else {
                generator.quote_identifier(a)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
