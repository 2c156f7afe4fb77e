use serde::{Deserialize, Serialize};

use super::{DataType, Node, Query, Span, SyntaxKind, Value};

/// Scalar expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column or qualified name: `col`, `t.col`.
    Identifier(Identifier),
    Literal { value: Value, span: Span },
    /// Script variable: `@name` (stored without the `@`).
    Variable { name: String, span: Span },
    /// `*` or `t.*`
    Wildcard {
        qualifier: Option<String>,
        span: Span,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// Explicit parentheses, kept for faithful regeneration.
    Grouping { inner: Box<Expr>, span: Span },
    Case(Box<CaseExpr>),
    Function(Box<FunctionCall>),
    /// `expr IS [NOT] NULL`
    IsNull {
        expr: Box<Expr>,
        negated: bool,
        span: Span,
    },
    /// `expr [NOT] IN (a, b, ...)`; `IN (SELECT ...)` is a single subquery item.
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
        span: Span,
    },
    /// Parenthesized query used as a value.
    Subquery { query: Box<Query>, span: Span },
    /// `[NOT] EXISTS (SELECT ...)`
    Exists {
        query: Box<Query>,
        negated: bool,
        span: Span,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
            span: Span::default(),
        }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        let span = left.span();
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
            span,
        }
    }

    /// Name a projected expression produces when it has no alias.
    pub fn output_name(&self) -> Option<String> {
        match self {
            Expr::Identifier(id) => Some(id.name().to_string()),
            Expr::Variable { name, .. } => Some(name.clone()),
            Expr::Function(f) => Some(f.name.to_lowercase()),
            Expr::Grouping { inner, .. } => inner.output_name(),
            _ => None,
        }
    }

    /// Split a predicate into its top-level AND operands.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
                ..
            } => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}

impl Node for Expr {
    fn kind(&self) -> SyntaxKind {
        match self {
            Expr::Identifier(_) => SyntaxKind::Identifier,
            Expr::Literal { .. } => SyntaxKind::Literal,
            Expr::Variable { .. } => SyntaxKind::Variable,
            Expr::Wildcard { .. } => SyntaxKind::Wildcard,
            Expr::Binary { .. } => SyntaxKind::Binary,
            Expr::Unary { .. } => SyntaxKind::Unary,
            Expr::Grouping { .. } => SyntaxKind::Grouping,
            Expr::Case(_) => SyntaxKind::Case,
            Expr::Function(_) => SyntaxKind::Function,
            Expr::IsNull { .. } => SyntaxKind::IsNull,
            Expr::InList { .. } => SyntaxKind::InList,
            Expr::Subquery { .. } => SyntaxKind::Subquery,
            Expr::Exists { .. } => SyntaxKind::Exists,
        }
    }

    fn span(&self) -> Span {
        match self {
            Expr::Identifier(id) => id.span,
            Expr::Case(c) => c.span,
            Expr::Function(f) => f.span,
            Expr::Literal { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Wildcard { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Grouping { span, .. }
            | Expr::IsNull { span, .. }
            | Expr::InList { span, .. }
            | Expr::Subquery { span, .. }
            | Expr::Exists { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `||` string concatenation
    Concat,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::Like
            | BinaryOp::NotLike => 4,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Concat => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Concat => "||",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A possibly qualified name. `resolution` is empty until binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub parts: Vec<String>,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl Identifier {
    pub fn new(parts: Vec<String>, span: Span) -> Self {
        Self {
            parts,
            span,
            resolution: None,
        }
    }

    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(vec![name.into()], Span::default())
    }

    /// Last part: the column or table name itself.
    pub fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    /// Everything before the last part, if any.
    pub fn qualifier(&self) -> Option<&str> {
        if self.parts.len() > 1 {
            Some(self.parts[self.parts.len() - 2].as_str())
        } else {
            None
        }
    }

    pub fn dotted(&self) -> String {
        self.parts.join(".")
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

/// What the binder found an identifier to refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub binding: Binding,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    /// Catalog column reached through a FROM source.
    Column {
        /// Alias or name the source is visible under.
        source: String,
        table: String,
        column: String,
    },
    CteColumn { cte: String, column: String },
    /// Column of a derived table.
    Derived { source: String, column: String },
    /// A catalog table named in FROM or as a DELETE target.
    Table { table: String },
    Cte { cte: String },
    /// Projection alias referenced from ORDER BY.
    OutputAlias { alias: String },
}

/// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpr {
    pub operand: Option<Expr>,
    pub when_clauses: Vec<WhenClause>,
    /// Absent ELSE stays `None`; it evaluates to NULL.
    pub else_result: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
    pub over: Option<OverClause>,
    pub span: Span,
}

impl FunctionCall {
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.name.to_uppercase().as_str(),
            "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
        )
    }
}

/// Window specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverClause {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
    pub frame_type: FrameType,
    /// First bound. With no `end`, the frame runs from here to the current row.
    pub start: Option<FrameBound>,
    pub end: Option<FrameBound>,
    pub span: Span,
}

impl OverClause {
    pub fn has_frame(&self) -> bool {
        self.start.is_some()
    }

    pub fn bounds(&self) -> impl Iterator<Item = &FrameBound> {
        self.start.iter().chain(self.end.iter())
    }

    /// Extent of the PRECEDING bound, if one is given.
    pub fn preceding(&self) -> Option<i64> {
        self.bounds()
            .find(|b| b.side == FrameSide::Preceding)
            .map(|b| b.extent)
    }

    /// Extent of the FOLLOWING bound, if one is given.
    pub fn following(&self) -> Option<i64> {
        self.bounds()
            .find(|b| b.side == FrameSide::Following)
            .map(|b| b.extent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameType {
    #[default]
    Rows,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSide {
    Preceding,
    Following,
}

/// Extent sentinel for `UNBOUNDED`.
pub const UNBOUNDED: i64 = -1;
/// Extent sentinel for `CURRENT ROW`.
pub const CURRENT_ROW: i64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameBound {
    pub side: FrameSide,
    /// `-1` is UNBOUNDED, `0` is CURRENT ROW, anything else a row count.
    pub extent: i64,
    pub span: Span,
}

impl FrameBound {
    pub fn is_unbounded(&self) -> bool {
        self.extent == UNBOUNDED
    }

    pub fn is_current_row(&self) -> bool {
        self.extent == CURRENT_ROW
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    /// `None` when the script wrote no direction.
    pub direction: Option<SortOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(start: (FrameSide, i64), end: Option<(FrameSide, i64)>) -> OverClause {
        let bound = |(side, extent)| FrameBound {
            side,
            extent,
            span: Span::default(),
        };
        OverClause {
            partition_by: vec![],
            order_by: vec![],
            frame_type: FrameType::Rows,
            start: Some(bound(start)),
            end: end.map(bound),
            span: Span::default(),
        }
    }

    #[test]
    fn test_frame_extents_by_side() {
        let over = frame(
            (FrameSide::Preceding, UNBOUNDED),
            Some((FrameSide::Following, CURRENT_ROW)),
        );
        assert_eq!(over.preceding(), Some(-1));
        assert_eq!(over.following(), Some(0));

        let over = frame((FrameSide::Preceding, 3), None);
        assert_eq!(over.preceding(), Some(3));
        assert_eq!(over.following(), None);
    }

    #[test]
    fn test_conjuncts_flatten_and_chain() {
        let a = Expr::literal(1);
        let pred = Expr::binary(
            Expr::binary(a.clone(), BinaryOp::And, a.clone()),
            BinaryOp::And,
            Expr::binary(a.clone(), BinaryOp::Or, a.clone()),
        );
        assert_eq!(pred.conjuncts().len(), 3);
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Expr::literal(1).kind(), SyntaxKind::Literal);
        let id = Expr::Identifier(Identifier::simple("x"));
        assert_eq!(id.kind(), SyntaxKind::Identifier);
    }
}
