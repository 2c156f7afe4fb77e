//! Expression grammar, lowest to highest binding:
//!
//! ```text
//! OR  <  AND  <  NOT  <  = <> < <= > >= LIKE IS IN  <  + - ||  <  * / %  <  unary -  <  primary
//! ```

use super::Parser;
use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Keyword, TokenKind};

impl Parser {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.eat_kw(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_not()?;
        while self.eat_kw(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        if self.peek().is_keyword(Keyword::Not) && !self.peek_nth(1).is_keyword(Keyword::Exists) {
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_additive()?;
        loop {
            let span = left.span();
            if let Some(op) = self.comparison_op() {
                self.advance();
                let right = self.parse_additive()?;
                left = Expr::binary(left, op, right);
                continue;
            }

            if self.eat_kw(Keyword::Is) {
                let negated = self.eat_kw(Keyword::Not);
                self.expect_kw(Keyword::Null)?;
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                    span,
                };
                continue;
            }

            // [NOT] LIKE / [NOT] IN
            let negated = self.peek().is_keyword(Keyword::Not)
                && matches!(
                    self.peek_nth(1).kind,
                    TokenKind::Keyword(Keyword::Like) | TokenKind::Keyword(Keyword::In)
                );
            if negated {
                self.advance();
            }
            if self.eat_kw(Keyword::Like) {
                let right = self.parse_additive()?;
                let op = if negated {
                    BinaryOp::NotLike
                } else {
                    BinaryOp::Like
                };
                left = Expr::binary(left, op, right);
            } else if self.eat_kw(Keyword::In) {
                let list = self.parse_in_list()?;
                left = Expr::InList {
                    expr: Box::new(left),
                    list,
                    negated,
                    span,
                };
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn comparison_op(&mut self) -> Option<BinaryOp> {
        let op = match self.peek().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => {
                self.note("comparison operator");
                return None;
            }
        };
        Some(op)
    }

    /// `(a, b, c)` or `(SELECT ...)`
    fn parse_in_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let span = self.span();
        self.expect(TokenKind::LParen)?;
        let list = if self.check_kw(Keyword::Select) || self.check_kw(Keyword::With) {
            let query = self.parse_query()?;
            vec![Expr::Subquery {
                query: Box::new(query),
                span,
            }]
        } else {
            self.parse_comma_list(|p| p.parse_expr())?
        };
        self.expect(TokenKind::RParen)?;
        Ok(list)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                TokenKind::Concat => BinaryOp::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        if self.eat(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let kind = self.peek().kind;
        match kind {
            TokenKind::Integer => {
                let token = self.peek().clone();
                let value = token
                    .lexeme
                    .parse::<i64>()
                    .map_err(|_| self.error_expecting("integer within 64 bits"))?;
                self.advance();
                Ok(literal(Value::Int(value), span))
            }
            TokenKind::Float => {
                let token = self.peek().clone();
                let value = token
                    .lexeme
                    .parse::<f64>()
                    .map_err(|_| self.error_expecting("number"))?;
                self.advance();
                Ok(literal(Value::Float(value), span))
            }
            TokenKind::String => {
                let text = self.advance().text();
                Ok(literal(Value::String(text), span))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(literal(Value::Null, span))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(literal(Value::Bool(true), span))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(literal(Value::Bool(false), span))
            }
            TokenKind::Keyword(Keyword::Timestamp)
                if self.peek_nth(1).kind == TokenKind::String =>
            {
                self.advance();
                let text = self.peek().text();
                let value = Value::parse_timestamp(&text)
                    .ok_or_else(|| self.error_expecting("timestamp 'YYYY-MM-DD HH:MM:SS'"))?;
                self.advance();
                Ok(literal(value, span))
            }
            TokenKind::Variable => {
                let name = self.advance().text();
                Ok(Expr::Variable { name, span })
            }
            TokenKind::Star => {
                self.advance();
                Ok(Expr::Wildcard {
                    qualifier: None,
                    span,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.check_kw(Keyword::Select) || self.check_kw(Keyword::With) {
                    let query = self.parse_query()?;
                    self.expect(TokenKind::RParen)?;
                    return Ok(Expr::Subquery {
                        query: Box::new(query),
                        span,
                    });
                }
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Grouping {
                    inner: Box::new(inner),
                    span,
                })
            }
            TokenKind::Keyword(Keyword::Not) | TokenKind::Keyword(Keyword::Exists) => {
                let negated = self.eat_kw(Keyword::Not);
                self.expect_kw(Keyword::Exists)?;
                self.expect(TokenKind::LParen)?;
                let query = self.parse_query()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Exists {
                    query: Box::new(query),
                    negated,
                    span,
                })
            }
            TokenKind::Keyword(Keyword::Case) => self.parse_case(),
            _ if self.at_name() => self.parse_name_expr(),
            _ => Err(self.error_expecting("expression")),
        }
    }

    /// Column reference, `t.*`, or function call.
    fn parse_name_expr(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let mut parts = vec![self.parse_name()?];

        if parts.len() == 1 && self.check(TokenKind::LParen) {
            let name = parts.remove(0);
            return self.parse_function(name, span);
        }

        while self.eat(TokenKind::Dot) {
            if self.eat(TokenKind::Star) {
                return Ok(Expr::Wildcard {
                    qualifier: Some(parts.join(".")),
                    span,
                });
            }
            parts.push(self.parse_name()?);
        }
        Ok(Expr::Identifier(Identifier::new(parts, span)))
    }

    fn parse_function(&mut self, name: String, span: Span) -> Result<Expr, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut distinct = false;
        let args = if self.eat(TokenKind::RParen) {
            vec![]
        } else {
            distinct = self.eat_kw(Keyword::Distinct);
            let args = self.parse_comma_list(|p| p.parse_expr())?;
            self.expect(TokenKind::RParen)?;
            args
        };
        let over = if self.eat_kw(Keyword::Over) {
            Some(self.parse_over()?)
        } else {
            None
        };
        Ok(Expr::Function(Box::new(FunctionCall {
            name,
            args,
            distinct,
            over,
            span,
        })))
    }

    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`
    fn parse_case(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Case)?;
        let operand = if self.check_kw(Keyword::When) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        let mut when_clauses = Vec::new();
        while self.eat_kw(Keyword::When) {
            let condition = self.parse_expr()?;
            self.expect_kw(Keyword::Then)?;
            let result = self.parse_expr()?;
            when_clauses.push(WhenClause { condition, result });
        }
        if when_clauses.is_empty() {
            return Err(self.error());
        }

        let else_result = if self.eat_kw(Keyword::Else) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_kw(Keyword::End)?;
        Ok(Expr::Case(Box::new(CaseExpr {
            operand,
            when_clauses,
            else_result,
            span,
        })))
    }

    /// Body of `OVER (...)`.
    fn parse_over(&mut self) -> Result<OverClause, SyntaxError> {
        let span = self.span();
        self.expect(TokenKind::LParen)?;
        let mut over = OverClause {
            partition_by: vec![],
            order_by: vec![],
            frame_type: FrameType::Rows,
            start: None,
            end: None,
            span,
        };

        if self.eat_kw(Keyword::Partition) {
            self.expect_kw(Keyword::By)?;
            over.partition_by = self.parse_comma_list(|p| p.parse_expr())?;
        }
        if self.eat_kw(Keyword::Order) {
            self.expect_kw(Keyword::By)?;
            over.order_by = self.parse_order_items()?;
        }

        let frame_type = if self.eat_kw(Keyword::Rows) {
            Some(FrameType::Rows)
        } else if self.eat_kw(Keyword::Range) {
            Some(FrameType::Range)
        } else {
            None
        };
        if let Some(frame_type) = frame_type {
            over.frame_type = frame_type;
            if self.eat_kw(Keyword::Between) {
                over.start = Some(self.parse_frame_bound(FrameSide::Preceding)?);
                self.expect_kw(Keyword::And)?;
                over.end = Some(self.parse_frame_bound(FrameSide::Following)?);
            } else {
                over.start = Some(self.parse_frame_bound(FrameSide::Preceding)?);
            }
        }

        self.expect(TokenKind::RParen)?;
        Ok(over)
    }

    /// One frame bound. `current_side` is the side recorded for CURRENT ROW
    /// and for a zero offset, which have none of their own.
    fn parse_frame_bound(&mut self, current_side: FrameSide) -> Result<FrameBound, SyntaxError> {
        let span = self.span();
        let extent = if self.eat_kw(Keyword::Unbounded) {
            UNBOUNDED
        } else if self.eat_kw(Keyword::Current) {
            self.expect_kw(Keyword::Row)?;
            return Ok(FrameBound {
                side: current_side,
                extent: CURRENT_ROW,
                span,
            });
        } else {
            // Sign is kept so a negative count can be rejected when binding
            let negative = self.eat(TokenKind::Minus);
            let token = self.peek().clone();
            if !self.check(TokenKind::Integer) {
                self.note("UNBOUNDED");
                self.note("CURRENT ROW");
                return Err(self.error());
            }
            let n = token
                .lexeme
                .parse::<i64>()
                .map_err(|_| self.error_expecting("row count"))?;
            self.advance();
            if negative { -n } else { n }
        };

        let side = if self.eat_kw(Keyword::Preceding) {
            FrameSide::Preceding
        } else if self.eat_kw(Keyword::Following) {
            FrameSide::Following
        } else {
            return Err(self.error());
        };
        // `0 PRECEDING` and `0 FOLLOWING` are the current row
        let side = if extent == CURRENT_ROW { current_side } else { side };
        Ok(FrameBound { side, extent, span })
    }
}

fn literal(value: Value, span: Span) -> Expr {
    Expr::Literal { value, span }
}
