//! Abstract syntax tree for weave scripts.
//!
//! The tree is a pure value: nodes own their children, the only sideways
//! link is `Cte::next`. The parser builds it, the binder fills
//! `Identifier::resolution`, and nothing restructures it afterwards.

pub mod expr;
pub mod query;
pub mod stmt;
pub mod values;

pub use expr::*;
pub use query::*;
pub use stmt::*;
pub use values::*;

use serde::{Deserialize, Serialize};

/// Source location of a node.
///
/// Spans never take part in structural equality: two trees parsed from
/// differently formatted text compare equal when their shapes match.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl PartialEq for Span {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Tag naming the grammar production a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxKind {
    Script,
    // Statements
    Comment,
    Use,
    Consume,
    Import,
    Produce,
    Request,
    Delete,
    Query,
    // Query structure
    Select,
    Union,
    QueryGroup,
    Cte,
    TableSource,
    Join,
    // Expressions
    Identifier,
    Literal,
    Variable,
    Wildcard,
    Binary,
    Unary,
    Grouping,
    Case,
    Function,
    Over,
    IsNull,
    InList,
    Subquery,
    Exists,
}

impl std::fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Common surface of every syntax node.
pub trait Node {
    /// The production tag. Derived from the Rust variant, so it always
    /// matches the node's runtime kind.
    fn kind(&self) -> SyntaxKind;

    fn span(&self) -> Span;
}

/// Root of a parsed script: statements in source (and execution) order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScriptModel {
    pub statements: Vec<Statement>,
}

impl ScriptModel {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    /// Statements that do something when executed (everything but comments).
    pub fn executable(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(|s| s.is_executable())
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl Node for ScriptModel {
    fn kind(&self) -> SyntaxKind {
        SyntaxKind::Script
    }

    fn span(&self) -> Span {
        self.statements
            .first()
            .map(|s| s.span())
            .unwrap_or_default()
    }
}
