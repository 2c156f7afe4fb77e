//! Recursive-descent parser for weave scripts.
//!
//! Works over the token vector produced by [`crate::lexer::tokenize`].
//! Comment tokens are pulled out up front and re-emitted as comment
//! statements at statement boundaries, so the grammar never sees them.
//!
//! ```text
//! WITH t AS (SELECT 1 AS x) SELECT x FROM t;
//! ──────────┬────────────── ───────┬───────
//!           │                      └── query body (statements.rs → query.rs)
//!           └── CTE chain (query.rs)
//! ```

mod expressions;
mod query;
mod statements;


use crate::ast::*;
use crate::error::{SyntaxError, WeaveError};
use crate::lexer::{self, Keyword, Token, TokenKind};

/// Tokenize and parse script text.
pub fn parse_script(text: &str) -> Result<ScriptModel, WeaveError> {
    let tokens = lexer::tokenize(text)?;
    Ok(parse(&tokens)?)
}

/// Parse a token sequence into a script.
pub fn parse(tokens: &[Token]) -> Result<ScriptModel, SyntaxError> {
    Parser::new(tokens).parse_script()
}

/// Keywords that may also be used as plain names (columns, tables) when
/// they are not in a position where they carry grammar meaning.
const SOFT_KEYWORDS: &[Keyword] = &[
    Keyword::Timestamp,
    Keyword::Row,
    Keyword::Rows,
    Keyword::Range,
    Keyword::Current,
    Keyword::Preceding,
    Keyword::Following,
    Keyword::Unbounded,
    Keyword::Partition,
    Keyword::Recursive,
    Keyword::Request,
    Keyword::Consume,
    Keyword::Produce,
    Keyword::Import,
    Keyword::Output,
];

pub(crate) struct Parser {
    tokens: Vec<Token>,
    /// Comments paired with the index of the token that follows them.
    comments: Vec<(usize, Token)>,
    pos: usize,
    /// Descriptions of everything tried at `pos` without success.
    expected: Vec<String>,
}

impl Parser {
    pub(crate) fn new(tokens: &[Token]) -> Self {
        let mut kept = Vec::with_capacity(tokens.len());
        let mut comments = Vec::new();
        for token in tokens {
            if token.kind.is_comment() {
                comments.push((kept.len(), token.clone()));
            } else {
                kept.push(token.clone());
            }
        }
        if kept.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            kept.push(Token::new(TokenKind::Eof, "", position));
        }
        Self {
            tokens: kept,
            comments,
            pos: 0,
            expected: Vec::new(),
        }
    }

    fn parse_script(mut self) -> Result<ScriptModel, SyntaxError> {
        let mut statements = Vec::new();
        let mut next_comment = 0;

        loop {
            while self.eat(TokenKind::Semicolon) {}
            if self.at_eof() {
                break;
            }
            let statement = self.parse_statement()?;
            // Comments before or inside the statement come out ahead of it
            while next_comment < self.comments.len() && self.comments[next_comment].0 < self.pos {
                statements.push(comment_statement(&self.comments[next_comment].1));
                next_comment += 1;
            }
            statements.push(statement);
        }

        statements.extend(self.comments[next_comment..].iter().map(|(_, t)| comment_statement(t)));
        Ok(ScriptModel::new(statements))
    }

    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::With) => {
                let with = self.parse_with_clause()?;
                if self.check_kw(Keyword::Delete) {
                    Ok(Statement::Delete(self.parse_delete(Some(with))?))
                } else if self.check_kw(Keyword::Select) || self.check(TokenKind::LParen) {
                    let mut query = self.parse_query_after_with()?;
                    query.span = with.head.span;
                    query.with = Some(with);
                    Ok(Statement::Select(query))
                } else {
                    Err(self.error())
                }
            }
            TokenKind::Keyword(Keyword::Select) | TokenKind::LParen => {
                Ok(Statement::Select(self.parse_query()?))
            }
            TokenKind::Keyword(Keyword::Delete) => Ok(Statement::Delete(self.parse_delete(None)?)),
            TokenKind::Keyword(Keyword::Use) => Ok(Statement::Use(self.parse_use()?)),
            TokenKind::Keyword(Keyword::Consume) => {
                Ok(Statement::Consume(self.parse_consume()?))
            }
            TokenKind::Keyword(Keyword::Import) => Ok(Statement::Import(self.parse_import()?)),
            TokenKind::Keyword(Keyword::Produce) => {
                Ok(Statement::Produce(self.parse_produce()?))
            }
            TokenKind::Keyword(Keyword::Request) => {
                Ok(Statement::Request(self.parse_request()?))
            }
            _ => {
                for kw in [
                    Keyword::Select,
                    Keyword::With,
                    Keyword::Delete,
                    Keyword::Use,
                    Keyword::Consume,
                    Keyword::Import,
                    Keyword::Produce,
                    Keyword::Request,
                ] {
                    self.note(kw.as_str());
                }
                Err(self.error())
            }
        }
    }

    // ── token cursor ──────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    pub(crate) fn span(&self) -> Span {
        self.peek().position.into()
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        self.expected.clear();
        token
    }

    pub(crate) fn note(&mut self, what: impl Into<String>) {
        let what = what.into();
        if !self.expected.contains(&what) {
            self.expected.push(what);
        }
    }

    pub(crate) fn check(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            true
        } else {
            self.note(kind.describe());
            false
        }
    }

    pub(crate) fn check_kw(&mut self, kw: Keyword) -> bool {
        self.check(TokenKind::Keyword(kw))
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_kw(&mut self, kw: Keyword) -> bool {
        self.eat(TokenKind::Keyword(kw))
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error())
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: Keyword) -> Result<Token, SyntaxError> {
        self.expect(TokenKind::Keyword(kw))
    }

    /// Error at the current token listing everything tried here.
    pub(crate) fn error(&self) -> SyntaxError {
        let token = self.peek();
        SyntaxError::new(token.position, token.describe(), self.expected.clone())
    }

    pub(crate) fn error_expecting(&mut self, what: &str) -> SyntaxError {
        self.note(what);
        self.error()
    }

    // ── shared small productions ──────────────────────────────────────

    /// A plain or quoted name. Soft keywords count as names here.
    pub(crate) fn parse_name(&mut self) -> Result<String, SyntaxError> {
        let kind = self.peek().kind;
        match kind {
            TokenKind::Ident | TokenKind::QuotedIdent => Ok(self.advance().text()),
            TokenKind::Keyword(kw) if SOFT_KEYWORDS.contains(&kw) => Ok(self.advance().text()),
            _ => Err(self.error_expecting("identifier")),
        }
    }

    pub(crate) fn at_name(&self) -> bool {
        match self.peek().kind {
            TokenKind::Ident | TokenKind::QuotedIdent => true,
            TokenKind::Keyword(kw) => SOFT_KEYWORDS.contains(&kw),
            _ => false,
        }
    }

    /// `name` or `a.b.c`
    pub(crate) fn parse_identifier(&mut self) -> Result<Identifier, SyntaxError> {
        let span = self.span();
        let mut parts = vec![self.parse_name()?];
        while self.eat(TokenKind::Dot) {
            parts.push(self.parse_name()?);
        }
        Ok(Identifier::new(parts, span))
    }

    /// Optional alias: `AS name` or a bare unquoted/quoted identifier.
    pub(crate) fn parse_alias(&mut self) -> Result<Option<String>, SyntaxError> {
        if self.eat_kw(Keyword::As) {
            return self.parse_name().map(Some);
        }
        match self.peek().kind {
            TokenKind::Ident | TokenKind::QuotedIdent => Ok(Some(self.advance().text())),
            _ => {
                self.note("alias");
                Ok(None)
            }
        }
    }

    pub(crate) fn parse_string(&mut self) -> Result<String, SyntaxError> {
        Ok(self.expect(TokenKind::String)?.text())
    }

    pub(crate) fn parse_unsigned(&mut self) -> Result<u64, SyntaxError> {
        let token = self.peek().clone();
        if !self.check(TokenKind::Integer) {
            return Err(self.error());
        }
        match token.lexeme.parse::<u64>() {
            Ok(n) => {
                self.advance();
                Ok(n)
            }
            Err(_) => Err(self.error_expecting("unsigned integer")),
        }
    }

    /// Optional `TOP n` or `TOP (n)`.
    pub(crate) fn parse_top(&mut self) -> Result<Option<u64>, SyntaxError> {
        if !self.eat_kw(Keyword::Top) {
            return Ok(None);
        }
        if self.eat(TokenKind::LParen) {
            let n = self.parse_unsigned()?;
            self.expect(TokenKind::RParen)?;
            Ok(Some(n))
        } else {
            self.parse_unsigned().map(Some)
        }
    }

    /// `@name`
    pub(crate) fn parse_variable_ref(&mut self) -> Result<VariableRef, SyntaxError> {
        let span = self.span();
        let token = self.expect(TokenKind::Variable)?;
        Ok(VariableRef {
            name: token.text(),
            span,
        })
    }

    pub(crate) fn parse_comma_list<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<Vec<T>, SyntaxError> {
        let mut items = vec![item(self)?];
        while self.eat(TokenKind::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }
}

fn comment_statement(token: &Token) -> Statement {
    let style = if token.kind == TokenKind::LineComment {
        CommentStyle::Line
    } else {
        CommentStyle::Block
    };
    Statement::Comment(Comment {
        text: token.lexeme.clone(),
        style,
        span: token.position.into(),
    })
}
