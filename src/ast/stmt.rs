use serde::{Deserialize, Serialize};

use super::{Expr, Node, OrderItem, Query, SelectItem, Span, SyntaxKind, TableExpr, TableSource, WithClause};

/// Top-level script statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(Query),
    Delete(DeleteStatement),
    Use(UseStatement),
    Comment(Comment),
    Consume(ConsumeStatement),
    Import(ImportStatement),
    Produce(ProduceStatement),
    Request(RequestStatement),
}

impl Statement {
    /// Comments are passthrough; every other statement does something.
    pub fn is_executable(&self) -> bool {
        !matches!(self, Statement::Comment(_))
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Delete(_) => "DELETE",
            Statement::Use(_) => "USE",
            Statement::Comment(_) => "COMMENT",
            Statement::Consume(_) => "CONSUME",
            Statement::Import(_) => "IMPORT",
            Statement::Produce(_) => "PRODUCE",
            Statement::Request(_) => "REQUEST",
        }
    }
}

impl Node for Statement {
    fn kind(&self) -> SyntaxKind {
        match self {
            Statement::Select(_) => SyntaxKind::Query,
            Statement::Delete(_) => SyntaxKind::Delete,
            Statement::Use(_) => SyntaxKind::Use,
            Statement::Comment(_) => SyntaxKind::Comment,
            Statement::Consume(_) => SyntaxKind::Consume,
            Statement::Import(_) => SyntaxKind::Import,
            Statement::Produce(_) => SyntaxKind::Produce,
            Statement::Request(_) => SyntaxKind::Request,
        }
    }

    fn span(&self) -> Span {
        match self {
            Statement::Select(q) => q.span,
            Statement::Delete(s) => s.span,
            Statement::Use(s) => s.span,
            Statement::Comment(s) => s.span,
            Statement::Consume(s) => s.span,
            Statement::Import(s) => s.span,
            Statement::Produce(s) => s.span,
            Statement::Request(s) => s.span,
        }
    }
}

/// `USE 'uri-template'` or `USE name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseStatement {
    pub target: UseTarget,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UseTarget {
    /// URI with `{var}` placeholders filled from script variables.
    Uri(String),
    /// Target declared in configuration.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentStyle {
    Line,
    Block,
}

/// A comment, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Full text including the `--` or `/* */` delimiters.
    pub text: String,
    pub style: CommentStyle,
    pub span: Span,
}

/// `CONSUME [TOP n] cols FROM source [WHERE ..] [ORDER BY ..]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeStatement {
    pub top: Option<u64>,
    pub projection: Vec<SelectItem>,
    pub source: TableSource,
    pub selection: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub span: Span,
}

/// `key = value` entry of a `WITH (...)` option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub key: String,
    pub value: Expr,
}

/// A `@name` slot written by IMPORT or REQUEST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRef {
    pub name: String,
    pub span: Span,
}

/// `IMPORT 'uri' [WITH (..)] INTO @a, @b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatement {
    pub source: String,
    pub options: Vec<OptionItem>,
    pub targets: Vec<VariableRef>,
    pub span: Span,
}

/// `PRODUCE 'uri' [WITH (..)] SELECT payload [FROM ..] [WHERE ..]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceStatement {
    pub target: String,
    pub options: Vec<OptionItem>,
    pub payload: Vec<SelectItem>,
    pub from: Option<TableExpr>,
    pub selection: Option<Expr>,
    pub span: Span,
}

/// `REQUEST 'uri' [WITH (headers)] SELECT options INTO @response`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatement {
    pub target: String,
    pub headers: Vec<OptionItem>,
    pub options: Vec<SelectItem>,
    pub into: VariableRef,
    pub span: Span,
}

/// `[WITH ..] DELETE [FROM] target [WITH (hints)] [OUTPUT ..] [FROM|USING ..] [WHERE ..]`
///
/// `FROM` and `USING` before the relation are synonyms and both land in
/// `from`; each dialect decides how to spell it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub with: Option<WithClause>,
    pub target: TableSource,
    pub output: Vec<SelectItem>,
    pub from: Option<TableExpr>,
    pub selection: Option<Expr>,
    pub span: Span,
}
