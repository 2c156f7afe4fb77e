//! Token types produced by the lexer.

use serde::{Deserialize, Serialize};

use crate::ast::Span;

/// A location in the script text. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    /// Move this position past `text`.
    pub fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += text.len();
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

impl From<Position> for Span {
    fn from(p: Position) -> Self {
        Span::new(p.line, p.column, p.offset)
    }
}

impl From<Span> for Position {
    fn from(s: Span) -> Self {
        Position {
            line: s.line,
            column: s.column,
            offset: s.offset,
        }
    }
}

/// Reserved words of the language. Matching is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    All,
    And,
    As,
    Asc,
    Between,
    By,
    Case,
    Consume,
    Cross,
    Current,
    Delete,
    Desc,
    Distinct,
    Else,
    End,
    Exists,
    False,
    Following,
    From,
    Full,
    Group,
    Having,
    Import,
    In,
    Inner,
    Into,
    Is,
    Join,
    Left,
    Like,
    Limit,
    Not,
    Null,
    Offset,
    On,
    Or,
    Order,
    Outer,
    Output,
    Over,
    Partition,
    Preceding,
    Produce,
    Range,
    Recursive,
    Request,
    Right,
    Row,
    Rows,
    Select,
    Then,
    Timestamp,
    Top,
    True,
    Unbounded,
    Union,
    Use,
    Using,
    When,
    Where,
    With,
}

impl Keyword {
    /// Look up a word, ignoring case.
    pub fn lookup(word: &str) -> Option<Keyword> {
        let kw = match word.to_ascii_uppercase().as_str() {
            "ALL" => Keyword::All,
            "AND" => Keyword::And,
            "AS" => Keyword::As,
            "ASC" => Keyword::Asc,
            "BETWEEN" => Keyword::Between,
            "BY" => Keyword::By,
            "CASE" => Keyword::Case,
            "CONSUME" => Keyword::Consume,
            "CROSS" => Keyword::Cross,
            "CURRENT" => Keyword::Current,
            "DELETE" => Keyword::Delete,
            "DESC" => Keyword::Desc,
            "DISTINCT" => Keyword::Distinct,
            "ELSE" => Keyword::Else,
            "END" => Keyword::End,
            "EXISTS" => Keyword::Exists,
            "FALSE" => Keyword::False,
            "FOLLOWING" => Keyword::Following,
            "FROM" => Keyword::From,
            "FULL" => Keyword::Full,
            "GROUP" => Keyword::Group,
            "HAVING" => Keyword::Having,
            "IMPORT" => Keyword::Import,
            "IN" => Keyword::In,
            "INNER" => Keyword::Inner,
            "INTO" => Keyword::Into,
            "IS" => Keyword::Is,
            "JOIN" => Keyword::Join,
            "LEFT" => Keyword::Left,
            "LIKE" => Keyword::Like,
            "LIMIT" => Keyword::Limit,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "OFFSET" => Keyword::Offset,
            "ON" => Keyword::On,
            "OR" => Keyword::Or,
            "ORDER" => Keyword::Order,
            "OUTER" => Keyword::Outer,
            "OUTPUT" => Keyword::Output,
            "OVER" => Keyword::Over,
            "PARTITION" => Keyword::Partition,
            "PRECEDING" => Keyword::Preceding,
            "PRODUCE" => Keyword::Produce,
            "RANGE" => Keyword::Range,
            "RECURSIVE" => Keyword::Recursive,
            "REQUEST" => Keyword::Request,
            "RIGHT" => Keyword::Right,
            "ROW" => Keyword::Row,
            "ROWS" => Keyword::Rows,
            "SELECT" => Keyword::Select,
            "THEN" => Keyword::Then,
            "TIMESTAMP" => Keyword::Timestamp,
            "TOP" => Keyword::Top,
            "TRUE" => Keyword::True,
            "UNBOUNDED" => Keyword::Unbounded,
            "UNION" => Keyword::Union,
            "USE" => Keyword::Use,
            "USING" => Keyword::Using,
            "WHEN" => Keyword::When,
            "WHERE" => Keyword::Where,
            "WITH" => Keyword::With,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::All => "ALL",
            Keyword::And => "AND",
            Keyword::As => "AS",
            Keyword::Asc => "ASC",
            Keyword::Between => "BETWEEN",
            Keyword::By => "BY",
            Keyword::Case => "CASE",
            Keyword::Consume => "CONSUME",
            Keyword::Cross => "CROSS",
            Keyword::Current => "CURRENT",
            Keyword::Delete => "DELETE",
            Keyword::Desc => "DESC",
            Keyword::Distinct => "DISTINCT",
            Keyword::Else => "ELSE",
            Keyword::End => "END",
            Keyword::Exists => "EXISTS",
            Keyword::False => "FALSE",
            Keyword::Following => "FOLLOWING",
            Keyword::From => "FROM",
            Keyword::Full => "FULL",
            Keyword::Group => "GROUP",
            Keyword::Having => "HAVING",
            Keyword::Import => "IMPORT",
            Keyword::In => "IN",
            Keyword::Inner => "INNER",
            Keyword::Into => "INTO",
            Keyword::Is => "IS",
            Keyword::Join => "JOIN",
            Keyword::Left => "LEFT",
            Keyword::Like => "LIKE",
            Keyword::Limit => "LIMIT",
            Keyword::Not => "NOT",
            Keyword::Null => "NULL",
            Keyword::Offset => "OFFSET",
            Keyword::On => "ON",
            Keyword::Or => "OR",
            Keyword::Order => "ORDER",
            Keyword::Outer => "OUTER",
            Keyword::Output => "OUTPUT",
            Keyword::Over => "OVER",
            Keyword::Partition => "PARTITION",
            Keyword::Preceding => "PRECEDING",
            Keyword::Produce => "PRODUCE",
            Keyword::Range => "RANGE",
            Keyword::Recursive => "RECURSIVE",
            Keyword::Request => "REQUEST",
            Keyword::Right => "RIGHT",
            Keyword::Row => "ROW",
            Keyword::Rows => "ROWS",
            Keyword::Select => "SELECT",
            Keyword::Then => "THEN",
            Keyword::Timestamp => "TIMESTAMP",
            Keyword::Top => "TOP",
            Keyword::True => "TRUE",
            Keyword::Unbounded => "UNBOUNDED",
            Keyword::Union => "UNION",
            Keyword::Use => "USE",
            Keyword::Using => "USING",
            Keyword::When => "WHEN",
            Keyword::Where => "WHERE",
            Keyword::With => "WITH",
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword(Keyword),
    /// Unquoted identifier
    Ident,
    /// `"name"`, `` `name` `` or `[name]`
    QuotedIdent,
    /// `@name`
    Variable,
    Integer,
    Float,
    /// Single-quoted string literal
    String,
    /// `-- ...`
    LineComment,
    /// `/* ... */`
    BlockComment,
    LParen,
    RParen,
    Comma,
    Dot,
    Semicolon,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    /// `||`
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eof,
}

impl TokenKind {
    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }

    /// Human readable name used in "expected ..." lists.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            TokenKind::Ident => "identifier".to_string(),
            TokenKind::QuotedIdent => "quoted identifier".to_string(),
            TokenKind::Variable => "variable".to_string(),
            TokenKind::Integer => "integer".to_string(),
            TokenKind::Float => "number".to_string(),
            TokenKind::String => "string".to_string(),
            TokenKind::LineComment | TokenKind::BlockComment => "comment".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Slash => "'/'".to_string(),
            TokenKind::Percent => "'%'".to_string(),
            TokenKind::Concat => "'||'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'<>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::LtEq => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::GtEq => "'>='".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A classified lexeme with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text exactly as written.
    pub lexeme: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            position,
        }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    /// The token's value with quoting removed.
    ///
    /// Strings and quoted identifiers lose their delimiters and have doubled
    /// delimiters collapsed; variables lose the leading `@`.
    pub fn text(&self) -> String {
        match self.kind {
            TokenKind::String => unescape(&self.lexeme[1..self.lexeme.len() - 1], '\''),
            TokenKind::QuotedIdent => {
                let inner = &self.lexeme[1..self.lexeme.len() - 1];
                match self.lexeme.chars().next() {
                    Some('"') => unescape(inner, '"'),
                    Some('`') => unescape(inner, '`'),
                    _ => unescape(inner, ']'),
                }
            }
            TokenKind::Variable => self.lexeme[1..].to_string(),
            _ => self.lexeme.clone(),
        }
    }

    /// Description used in syntax errors ("found ...").
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Keyword(kw) => format!("keyword {}", kw),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

fn unescape(inner: &str, delimiter: char) -> String {
    let doubled: String = [delimiter, delimiter].iter().collect();
    inner.replace(&doubled, &delimiter.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_ignores_case() {
        assert_eq!(Keyword::lookup("select"), Some(Keyword::Select));
        assert_eq!(Keyword::lookup("CoNsUmE"), Some(Keyword::Consume));
        assert_eq!(Keyword::lookup("users"), None);
    }

    #[test]
    fn test_token_text_unquotes() {
        let p = Position::start();
        assert_eq!(Token::new(TokenKind::String, "'it''s'", p).text(), "it's");
        assert_eq!(Token::new(TokenKind::QuotedIdent, "\"a\"\"b\"", p).text(), "a\"b");
        assert_eq!(Token::new(TokenKind::QuotedIdent, "[order]", p).text(), "order");
        assert_eq!(Token::new(TokenKind::Variable, "@resp", p).text(), "resp");
    }

    #[test]
    fn test_position_advance() {
        let mut p = Position::start();
        p.advance("ab\ncd");
        assert_eq!(p.line, 2);
        assert_eq!(p.column, 3);
        assert_eq!(p.offset, 5);
    }
}
