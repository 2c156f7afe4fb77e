//! SELECT, UNION, WITH chains and FROM clauses.

use super::Parser;
use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Keyword, TokenKind};

impl Parser {
    /// `[WITH ..] body [ORDER BY ..] [LIMIT n [OFFSET m]]`
    pub(crate) fn parse_query(&mut self) -> Result<Query, SyntaxError> {
        if self.check_kw(Keyword::With) {
            let span = self.span();
            let with = self.parse_with_clause()?;
            let mut query = self.parse_query_after_with()?;
            query.with = Some(with);
            query.span = span;
            return Ok(query);
        }
        self.parse_query_after_with()
    }

    pub(crate) fn parse_query_after_with(&mut self) -> Result<Query, SyntaxError> {
        let span = self.span();
        let body = self.parse_union()?;
        let mut query = Query::new(body, span);
        if self.eat_kw(Keyword::Order) {
            self.expect_kw(Keyword::By)?;
            query.order_by = self.parse_order_items()?;
        }
        if self.eat_kw(Keyword::Limit) {
            let count = self.parse_unsigned()?;
            let offset = if self.eat_kw(Keyword::Offset) {
                Some(self.parse_unsigned()?)
            } else {
                None
            };
            query.limit = Some(Limit { count, offset });
        }
        Ok(query)
    }

    /// Left-leaning chain of UNION / UNION ALL.
    fn parse_union(&mut self) -> Result<QueryExpr, SyntaxError> {
        let mut left = self.parse_query_term()?;
        loop {
            let span = self.span();
            if !self.eat_kw(Keyword::Union) {
                break;
            }
            let all = self.eat_kw(Keyword::All);
            let right = self.parse_query_term()?;
            left = QueryExpr::Union(Box::new(Union {
                all,
                left,
                right,
                span,
            }));
        }
        Ok(left)
    }

    fn parse_query_term(&mut self) -> Result<QueryExpr, SyntaxError> {
        if self.eat(TokenKind::LParen) {
            let query = self.parse_query()?;
            self.expect(TokenKind::RParen)?;
            return Ok(QueryExpr::Grouping(Box::new(query)));
        }
        Ok(QueryExpr::Select(Box::new(self.parse_select()?)))
    }

    fn parse_select(&mut self) -> Result<Select, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Select)?;
        let distinct = self.eat_kw(Keyword::Distinct);
        let top = self.parse_top()?;
        let projection = self.parse_select_items()?;
        let mut select = Select::new(projection, span);
        select.distinct = distinct;
        select.top = top;

        if self.eat_kw(Keyword::From) {
            select.from = Some(self.parse_table_expr()?);
        }
        if self.eat_kw(Keyword::Where) {
            select.selection = Some(self.parse_expr()?);
        }
        if self.eat_kw(Keyword::Group) {
            self.expect_kw(Keyword::By)?;
            select.group_by = self.parse_comma_list(|p| p.parse_expr())?;
        }
        if self.eat_kw(Keyword::Having) {
            select.having = Some(self.parse_expr()?);
        }
        Ok(select)
    }

    pub(crate) fn parse_select_items(&mut self) -> Result<Vec<SelectItem>, SyntaxError> {
        self.parse_comma_list(|p| {
            let expr = p.parse_expr()?;
            let alias = match expr {
                Expr::Wildcard { .. } => None,
                _ => p.parse_alias()?,
            };
            Ok(SelectItem { expr, alias })
        })
    }

    pub(crate) fn parse_order_items(&mut self) -> Result<Vec<OrderItem>, SyntaxError> {
        self.parse_comma_list(|p| {
            let expr = p.parse_expr()?;
            let direction = if p.eat_kw(Keyword::Asc) {
                Some(SortOrder::Asc)
            } else if p.eat_kw(Keyword::Desc) {
                Some(SortOrder::Desc)
            } else {
                None
            };
            Ok(OrderItem { expr, direction })
        })
    }

    // ── WITH chains ───────────────────────────────────────────────────

    /// `WITH [RECURSIVE] name [(cols)] AS (query) [, ...]`
    pub(crate) fn parse_with_clause(&mut self) -> Result<WithClause, SyntaxError> {
        self.expect_kw(Keyword::With)?;
        let recursive = self.eat_kw(Keyword::Recursive);
        let mut head = self.parse_cte()?;
        while self.eat(TokenKind::Comma) {
            let cte = self.parse_cte()?;
            head.push(cte);
        }
        Ok(WithClause { recursive, head })
    }

    fn parse_cte(&mut self) -> Result<Cte, SyntaxError> {
        let span = self.span();
        let name = self.parse_name()?;
        let columns = if self.eat(TokenKind::LParen) {
            let cols = self.parse_comma_list(|p| p.parse_name())?;
            self.expect(TokenKind::RParen)?;
            cols
        } else {
            vec![]
        };
        self.expect_kw(Keyword::As)?;
        self.expect(TokenKind::LParen)?;
        let query = self.parse_query()?;
        self.expect(TokenKind::RParen)?;
        Ok(Cte {
            name,
            columns,
            query: Box::new(query),
            next: None,
            span,
        })
    }

    // ── FROM clauses ──────────────────────────────────────────────────

    /// Sources joined left to right: `a JOIN b ON .. , c`.
    pub(crate) fn parse_table_expr(&mut self) -> Result<TableExpr, SyntaxError> {
        let mut left = TableExpr::Source(self.parse_table_source()?);
        loop {
            let span = self.span();
            let kind = if self.eat(TokenKind::Comma) {
                JoinKind::Comma
            } else if self.eat_kw(Keyword::Cross) {
                self.expect_kw(Keyword::Join)?;
                JoinKind::Cross
            } else if let Some(kind) = self.parse_join_keyword()? {
                kind
            } else {
                break;
            };

            let right = TableExpr::Source(self.parse_table_source()?);
            let constraint = match kind {
                JoinKind::Comma | JoinKind::Cross => None,
                _ => {
                    self.expect_kw(Keyword::On)?;
                    Some(self.parse_expr()?)
                }
            };
            left = TableExpr::Join(Box::new(Join {
                kind,
                left,
                right,
                constraint,
                span,
            }));
        }
        Ok(left)
    }

    /// `[INNER] JOIN`, `LEFT [OUTER] JOIN`, `RIGHT ..`, `FULL ..`
    fn parse_join_keyword(&mut self) -> Result<Option<JoinKind>, SyntaxError> {
        let kind = if self.eat_kw(Keyword::Join) {
            return Ok(Some(JoinKind::Inner));
        } else if self.eat_kw(Keyword::Inner) {
            JoinKind::Inner
        } else if self.eat_kw(Keyword::Left) {
            JoinKind::Left
        } else if self.eat_kw(Keyword::Right) {
            JoinKind::Right
        } else if self.eat_kw(Keyword::Full) {
            JoinKind::Full
        } else {
            return Ok(None);
        };
        if kind != JoinKind::Inner {
            self.eat_kw(Keyword::Outer);
        }
        self.expect_kw(Keyword::Join)?;
        Ok(Some(kind))
    }

    /// `name [[AS] alias] [WITH (hints)]` or `(query) [AS] alias`
    pub(crate) fn parse_table_source(&mut self) -> Result<TableSource, SyntaxError> {
        let span = self.span();
        if self.eat(TokenKind::LParen) {
            let query = self.parse_query()?;
            self.expect(TokenKind::RParen)?;
            let alias = match self.parse_alias()? {
                Some(alias) => alias,
                None => return Err(self.error()),
            };
            return Ok(TableSource {
                relation: Relation::Derived(Box::new(query)),
                alias: Some(alias),
                hints: vec![],
                span,
            });
        }

        let name = self.parse_identifier()?;
        let alias = self.parse_alias()?;
        let hints = self.parse_table_hints()?;
        Ok(TableSource {
            relation: Relation::Named(name),
            alias,
            hints,
            span,
        })
    }

    /// `WITH (NOLOCK, INDEX(ix_name))`. A WITH not followed by `(` belongs
    /// to the next statement's CTE chain and is left alone.
    pub(crate) fn parse_table_hints(&mut self) -> Result<Vec<TableHint>, SyntaxError> {
        if !(self.peek().is_keyword(Keyword::With) && self.peek_nth(1).kind == TokenKind::LParen) {
            self.note("WITH (");
            return Ok(vec![]);
        }
        self.advance();
        self.advance();
        let hints = self.parse_comma_list(|p| {
            let name = p.parse_name()?.to_uppercase();
            let mut args = vec![];
            if p.eat(TokenKind::LParen) {
                args = p.parse_comma_list(|p| {
                    if p.check(TokenKind::Integer) {
                        Ok(p.advance().lexeme)
                    } else {
                        p.parse_name()
                    }
                })?;
                p.expect(TokenKind::RParen)?;
            }
            Ok(TableHint { name, args })
        })?;
        self.expect(TokenKind::RParen)?;
        Ok(hints)
    }
}
