//! Error types for sqlweave.
//!
//! Each compiler phase has its own error enum; `WeaveError` unifies them
//! for callers that drive the whole pipeline.

use thiserror::Error;

use crate::lexer::Position;
use crate::transpiler::Dialect;

/// Malformed token in the script text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexicalError {
    /// A string, quoted identifier or block comment never closed.
    #[error("Unterminated {what} starting at {position}")]
    Unterminated {
        what: &'static str,
        position: Position,
    },

    /// A character that starts no token.
    #[error("Illegal character '{ch}' at {position}")]
    IllegalCharacter { ch: char, position: Position },

    /// Digits running straight into identifier characters, like `12abc`.
    #[error("Malformed number '{lexeme}' at {position}")]
    MalformedNumber { lexeme: String, position: Position },
}

impl LexicalError {
    pub fn position(&self) -> Position {
        match self {
            LexicalError::Unterminated { position, .. }
            | LexicalError::IllegalCharacter { position, .. }
            | LexicalError::MalformedNumber { position, .. } => *position,
        }
    }
}

/// Grammar violation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax error at {position}: found {found}, expected {}", .expected.join(" | "))]
pub struct SyntaxError {
    pub position: Position,
    /// Description of the offending token.
    pub found: String,
    /// Everything that would have been accepted here.
    pub expected: Vec<String>,
}

impl SyntaxError {
    pub fn new(position: Position, found: impl Into<String>, expected: Vec<String>) -> Self {
        Self {
            position,
            found: found.into(),
            expected,
        }
    }
}

fn hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean '{}'?", s),
        None => String::new(),
    }
}

/// Semantic error found while resolving a parsed script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("Unknown table '{name}' at {position} (searched: {scope}){}", hint(.suggestion))]
    UnresolvedTable {
        name: String,
        position: Position,
        scope: String,
        suggestion: Option<String>,
    },

    #[error("Unknown column '{name}' at {position} (searched: {scope}){}", hint(.suggestion))]
    UnresolvedColumn {
        name: String,
        position: Position,
        scope: String,
        suggestion: Option<String>,
    },

    /// Unqualified column found in more than one visible source.
    #[error("Ambiguous column '{name}' at {position}: found in {}", .candidates.join(", "))]
    AmbiguousColumn {
        name: String,
        position: Position,
        candidates: Vec<String>,
    },

    #[error("Duplicate CTE name '{name}' at {position} (first defined at {first})")]
    DuplicateCte {
        name: String,
        position: Position,
        first: Position,
    },

    /// A CTE used before the point of the chain that defines it.
    #[error("CTE '{name}' referenced at {position} before it is defined")]
    ForwardCteReference { name: String, position: Position },

    #[error("CTE '{name}' at {position} lists {declared} columns but its query produces {actual}")]
    CteColumnCount {
        name: String,
        position: Position,
        declared: usize,
        actual: usize,
    },

    #[error("UNION at {position} combines {left} columns with {right}")]
    UnionArity {
        position: Position,
        left: usize,
        right: usize,
    },

    #[error("Illegal window frame bound at {position}: {reason}")]
    IllegalFrameBound { position: Position, reason: String },

    /// OUTPUT names something that is neither the target nor a joined source.
    #[error("OUTPUT column '{name}' at {position} must come from the DELETE target or a joined source ({scope})")]
    InvalidOutputReference {
        name: String,
        position: Position,
        scope: String,
    },

    /// The same variable slot assigned twice by one statement.
    #[error("Variable '@{name}' at {position} is assigned more than once")]
    AmbiguousVariable { name: String, position: Position },

    #[error("Variable '@{name}' at {position} is read before any statement assigns it")]
    UndefinedVariable { name: String, position: Position },

    #[error("Duplicate table alias '{alias}' at {position}")]
    DuplicateAlias { alias: String, position: Position },

    #[error("{clause} position {ordinal} at {position} is not in the select list of {columns} columns")]
    OrdinalOutOfRange {
        clause: String,
        ordinal: i64,
        columns: usize,
        position: Position,
    },

    #[error("ORDER BY position {ordinal} at {position} names a set operation column with no name; alias it")]
    UnnamedOrdinal { ordinal: i64, position: Position },
}

impl BindError {
    pub fn position(&self) -> Position {
        match self {
            BindError::UnresolvedTable { position, .. }
            | BindError::UnresolvedColumn { position, .. }
            | BindError::AmbiguousColumn { position, .. }
            | BindError::DuplicateCte { position, .. }
            | BindError::ForwardCteReference { position, .. }
            | BindError::CteColumnCount { position, .. }
            | BindError::UnionArity { position, .. }
            | BindError::IllegalFrameBound { position, .. }
            | BindError::InvalidOutputReference { position, .. }
            | BindError::AmbiguousVariable { position, .. }
            | BindError::UndefinedVariable { position, .. }
            | BindError::DuplicateAlias { position, .. }
            | BindError::OrdinalOutOfRange { position, .. }
            | BindError::UnnamedOrdinal { position, .. } => *position,
        }
    }
}

/// A bound construct that has no faithful rendering in a dialect.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{feature} is not supported by {dialect}")]
pub struct UnsupportedFeatureError {
    pub feature: String,
    pub dialect: Dialect,
}

impl UnsupportedFeatureError {
    pub fn new(feature: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            feature: feature.into(),
            dialect,
        }
    }
}

/// Failure while running a compiled script.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Error reported by the query backend, passed through as-is.
    #[error("Database error: {0}")]
    Backend(String),

    /// Error reported by a queue/HTTP/file transport.
    #[error("Transport error for {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    /// A `{name}` placeholder in a USE target with no matching variable.
    #[error("Variable '{0}' is not bound")]
    UnboundVariable(String),

    /// A row set used where a single value is needed.
    #[error("Variable '@{0}' holds rows, not a single value")]
    NotScalar(String),

    #[error("Unknown target '{0}'")]
    UnknownTarget(String),

    #[error("No transport registered for scheme '{0}'")]
    UnsupportedScheme(String),

    /// A relational statement ran while the active target is not a database.
    #[error("Statement needs a database target, active target is {0}")]
    NoDatabaseTarget(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeatureError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExecutionError {
    pub fn transport(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

/// Any error the weave pipeline can produce.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedFeatureError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeaveError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for sqlweave operations.
pub type WeaveResult<T> = Result<T, WeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new(
            Position {
                line: 1,
                column: 8,
                offset: 7,
            },
            "end of input",
            vec!["FROM".to_string(), "','".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 8: found end of input, expected FROM | ','"
        );
    }

    #[test]
    fn test_bind_error_suggestion() {
        let err = BindError::UnresolvedTable {
            name: "usres".to_string(),
            position: Position::start(),
            scope: "catalog".to_string(),
            suggestion: Some("users".to_string()),
        };
        assert!(err.to_string().ends_with("Did you mean 'users'?"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = UnsupportedFeatureError::new("FULL JOIN", Dialect::MySql);
        assert_eq!(err.to_string(), "FULL JOIN is not supported by mysql");
    }
}
