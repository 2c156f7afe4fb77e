use serde::{Deserialize, Serialize};

use super::{Expr, Identifier, Node, OrderItem, Span, SyntaxKind};

/// A full query: optional WITH chain, body, ordering and row limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub with: Option<WithClause>,
    pub body: QueryExpr,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Limit>,
    pub span: Span,
}

impl Query {
    pub fn new(body: QueryExpr, span: Span) -> Self {
        Self {
            with: None,
            body,
            order_by: vec![],
            limit: None,
            span,
        }
    }

    /// The leftmost SELECT, which names the query's output columns.
    pub fn first_select(&self) -> &Select {
        self.body.first_select()
    }
}

impl Node for Query {
    fn kind(&self) -> SyntaxKind {
        SyntaxKind::Query
    }

    fn span(&self) -> Span {
        self.span
    }
}

/// `LIMIT n [OFFSET m]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub count: u64,
    pub offset: Option<u64>,
}

/// Query body: a SELECT, a UNION of two bodies, or a parenthesized query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryExpr {
    Select(Box<Select>),
    Union(Box<Union>),
    Grouping(Box<Query>),
}

impl QueryExpr {
    pub fn first_select(&self) -> &Select {
        match self {
            QueryExpr::Select(s) => s,
            QueryExpr::Union(u) => u.left.first_select(),
            QueryExpr::Grouping(q) => q.first_select(),
        }
    }
}

impl Node for QueryExpr {
    fn kind(&self) -> SyntaxKind {
        match self {
            QueryExpr::Select(_) => SyntaxKind::Select,
            QueryExpr::Union(_) => SyntaxKind::Union,
            QueryExpr::Grouping(_) => SyntaxKind::QueryGroup,
        }
    }

    fn span(&self) -> Span {
        match self {
            QueryExpr::Select(s) => s.span,
            QueryExpr::Union(u) => u.span,
            QueryExpr::Grouping(q) => q.span,
        }
    }
}

/// `left UNION [ALL] right`. Chains lean left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    /// `UNION ALL` keeps duplicates, plain `UNION` removes them.
    pub all: bool,
    pub left: QueryExpr,
    pub right: QueryExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub distinct: bool,
    /// `TOP n`
    pub top: Option<u64>,
    pub projection: Vec<SelectItem>,
    pub from: Option<TableExpr>,
    pub selection: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub span: Span,
}

impl Select {
    pub fn new(projection: Vec<SelectItem>, span: Span) -> Self {
        Self {
            distinct: false,
            top: None,
            projection,
            from: None,
            selection: None,
            group_by: vec![],
            having: None,
            span,
        }
    }
}

/// One projected expression with its optional `AS` alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    /// Output column name: the alias, or the name the expression implies.
    pub fn output_name(&self) -> Option<String> {
        self.alias.clone().or_else(|| self.expr.output_name())
    }
}

/// FROM-clause relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableExpr {
    Source(TableSource),
    Join(Box<Join>),
}

impl TableExpr {
    /// Leaf sources in left-to-right order.
    pub fn sources(&self) -> Vec<&TableSource> {
        match self {
            TableExpr::Source(s) => vec![s],
            TableExpr::Join(j) => {
                let mut all = j.left.sources();
                all.extend(j.right.sources());
                all
            }
        }
    }

    /// Join kinds used anywhere in the relation.
    pub fn join_kinds(&self) -> Vec<JoinKind> {
        match self {
            TableExpr::Source(_) => vec![],
            TableExpr::Join(j) => {
                let mut kinds = j.left.join_kinds();
                kinds.push(j.kind);
                kinds.extend(j.right.join_kinds());
                kinds
            }
        }
    }
}

impl Node for TableExpr {
    fn kind(&self) -> SyntaxKind {
        match self {
            TableExpr::Source(_) => SyntaxKind::TableSource,
            TableExpr::Join(_) => SyntaxKind::Join,
        }
    }

    fn span(&self) -> Span {
        match self {
            TableExpr::Source(s) => s.span,
            TableExpr::Join(j) => j.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub left: TableExpr,
    pub right: TableExpr,
    /// `ON` predicate; `None` for CROSS and comma joins.
    pub constraint: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    /// `FROM a, b`
    Comma,
}

impl JoinKind {
    pub fn is_outer(&self) -> bool {
        matches!(self, JoinKind::Left | JoinKind::Right | JoinKind::Full)
    }
}

/// A named table or derived table, with alias and dialect hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub relation: Relation,
    pub alias: Option<String>,
    /// `WITH (NOLOCK, INDEX(ix))`
    pub hints: Vec<TableHint>,
    pub span: Span,
}

impl TableSource {
    pub fn named(name: Identifier) -> Self {
        let span = name.span;
        Self {
            relation: Relation::Named(name),
            alias: None,
            hints: vec![],
            span,
        }
    }

    /// Name the source is visible under: the alias, else the table name.
    pub fn visible_name(&self) -> Option<&str> {
        match (&self.alias, &self.relation) {
            (Some(alias), _) => Some(alias.as_str()),
            (None, Relation::Named(id)) => Some(id.name()),
            (None, Relation::Derived(_)) => None,
        }
    }

    pub fn table_name(&self) -> Option<&Identifier> {
        match &self.relation {
            Relation::Named(id) => Some(id),
            Relation::Derived(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Relation {
    Named(Identifier),
    /// `(SELECT ...) AS alias`
    Derived(Box<Query>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHint {
    /// Upper-cased hint name, e.g. `NOLOCK` or `INDEX`.
    pub name: String,
    pub args: Vec<String>,
}

impl TableHint {
    pub fn is_index(&self) -> bool {
        self.name.eq_ignore_ascii_case("INDEX")
    }
}

/// `WITH [RECURSIVE] a AS (...), b AS (...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    pub recursive: bool,
    pub head: Cte,
}

impl WithClause {
    /// CTEs in declaration order.
    pub fn iter(&self) -> CteIter<'_> {
        CteIter {
            next: Some(&self.head),
        }
    }
}

/// One link of a WITH chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    pub name: String,
    /// Explicit column aliases; empty when not given.
    pub columns: Vec<String>,
    pub query: Box<Query>,
    pub next: Option<Box<Cte>>,
    pub span: Span,
}

impl Cte {
    /// Append a CTE to the end of the chain starting at `self`.
    pub fn push(&mut self, cte: Cte) {
        match &mut self.next {
            Some(next) => next.push(cte),
            None => self.next = Some(Box::new(cte)),
        }
    }
}

impl Node for Cte {
    fn kind(&self) -> SyntaxKind {
        SyntaxKind::Cte
    }

    fn span(&self) -> Span {
        self.span
    }
}

pub struct CteIter<'a> {
    next: Option<&'a Cte>,
}

impl<'a> Iterator for CteIter<'a> {
    type Item = &'a Cte;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.next.as_deref();
        Some(current)
    }
}
