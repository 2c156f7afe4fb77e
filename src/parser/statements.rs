//! DELETE and the integration verbs.

use super::Parser;
use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::{Keyword, TokenKind};

impl Parser {
    /// `DELETE [FROM] target [WITH (hints)] [OUTPUT ..] [FROM|USING ..] [WHERE ..]`
    pub(crate) fn parse_delete(
        &mut self,
        with: Option<WithClause>,
    ) -> Result<DeleteStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Delete)?;
        self.eat_kw(Keyword::From);
        let target = self.parse_table_source()?;
        if let Relation::Derived(_) = target.relation {
            return Err(SyntaxError::new(
                target.span.into(),
                "derived table",
                vec!["table name".to_string()],
            ));
        }

        let output = if self.eat_kw(Keyword::Output) {
            self.parse_select_items()?
        } else {
            vec![]
        };

        let from = if self.eat_kw(Keyword::From) || self.eat_kw(Keyword::Using) {
            Some(self.parse_table_expr()?)
        } else {
            None
        };

        let selection = if self.eat_kw(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(DeleteStatement {
            with,
            target,
            output,
            from,
            selection,
            span,
        })
    }

    /// `USE 'uri'` or `USE name`
    pub(crate) fn parse_use(&mut self) -> Result<UseStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Use)?;
        let target = if self.check(TokenKind::String) {
            UseTarget::Uri(self.parse_string()?)
        } else {
            UseTarget::Named(self.parse_name()?)
        };
        Ok(UseStatement { target, span })
    }

    /// `CONSUME [TOP n] cols FROM source [WHERE ..] [ORDER BY ..]`
    pub(crate) fn parse_consume(&mut self) -> Result<ConsumeStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Consume)?;
        let top = self.parse_top()?;
        let projection = self.parse_select_items()?;
        self.expect_kw(Keyword::From)?;
        let source = self.parse_table_source()?;

        // A consume reads exactly one source
        if matches!(
            self.peek().kind,
            TokenKind::Comma
                | TokenKind::Keyword(Keyword::Join)
                | TokenKind::Keyword(Keyword::Inner)
                | TokenKind::Keyword(Keyword::Left)
                | TokenKind::Keyword(Keyword::Right)
                | TokenKind::Keyword(Keyword::Full)
                | TokenKind::Keyword(Keyword::Cross)
        ) {
            self.expected.clear();
            self.note("WHERE");
            self.note("ORDER BY");
            self.note("';'");
            return Err(self.error());
        }

        let selection = if self.eat_kw(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let order_by = if self.eat_kw(Keyword::Order) {
            self.expect_kw(Keyword::By)?;
            self.parse_order_items()?
        } else {
            vec![]
        };

        Ok(ConsumeStatement {
            top,
            projection,
            source,
            selection,
            order_by,
            span,
        })
    }

    /// `IMPORT 'uri' [WITH (..)] INTO @a [, @b ..]`
    pub(crate) fn parse_import(&mut self) -> Result<ImportStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Import)?;
        let source = self.parse_string()?;
        let options = self.parse_option_list()?;
        self.expect_kw(Keyword::Into)?;
        let targets = self.parse_comma_list(|p| p.parse_variable_ref())?;
        Ok(ImportStatement {
            source,
            options,
            targets,
            span,
        })
    }

    /// `PRODUCE 'uri' [WITH (..)] SELECT payload [FROM ..] [WHERE ..]`
    pub(crate) fn parse_produce(&mut self) -> Result<ProduceStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Produce)?;
        let target = self.parse_string()?;
        let options = self.parse_option_list()?;
        self.expect_kw(Keyword::Select)?;
        let payload = self.parse_select_items()?;
        let from = if self.eat_kw(Keyword::From) {
            Some(self.parse_table_expr()?)
        } else {
            None
        };
        let selection = if self.eat_kw(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(ProduceStatement {
            target,
            options,
            payload,
            from,
            selection,
            span,
        })
    }

    /// `REQUEST 'uri' [WITH (headers)] [SELECT options] INTO @response`
    pub(crate) fn parse_request(&mut self) -> Result<RequestStatement, SyntaxError> {
        let span = self.span();
        self.expect_kw(Keyword::Request)?;
        let target = self.parse_string()?;
        let headers = self.parse_option_list()?;
        let options = if self.eat_kw(Keyword::Select) {
            self.parse_select_items()?
        } else {
            vec![]
        };
        self.expect_kw(Keyword::Into)?;
        let into = self.parse_variable_ref()?;
        Ok(RequestStatement {
            target,
            headers,
            options,
            into,
            span,
        })
    }

    /// Optional `WITH (key = expr, ...)`. Keys are names or string literals.
    fn parse_option_list(&mut self) -> Result<Vec<OptionItem>, SyntaxError> {
        if !self.eat_kw(Keyword::With) {
            return Ok(vec![]);
        }
        self.expect(TokenKind::LParen)?;
        let items = self.parse_comma_list(|p| {
            let key = if p.check(TokenKind::String) {
                p.parse_string()?
            } else {
                p.parse_name()?
            };
            p.expect(TokenKind::Eq)?;
            let value = p.parse_expr()?;
            Ok(OptionItem { key, value })
        })?;
        self.expect(TokenKind::RParen)?;
        Ok(items)
    }
}
