//! Renders a parsed script back to weave source.
//!
//! The output re-parses to an equal tree: comments keep their place among
//! statements, explicit parentheses survive as written, and names that
//! would not lex as plain identifiers are double-quoted. Top-level clauses
//! start on their own line; nested queries stay inline.

use std::fmt::{Result, Write};

use crate::ast::*;
use crate::lexer::Keyword;


pub struct Formatter {
    /// Nesting depth of the query being written; 0 is a statement.
    depth: usize,
    buffer: String,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a whole script, one statement per line.
pub fn format_script(script: &ScriptModel) -> String {
    Formatter::new().format(script).unwrap_or_default()
}

/// Render a single expression.
pub fn render_expr(expr: &Expr) -> String {
    let mut f = Formatter::new();
    f.depth = 1;
    match f.visit_expr(expr) {
        Ok(()) => f.buffer,
        Err(_) => String::new(),
    }
}

/// Quote a name unless it lexes back as the same plain identifier.
pub fn quote_name(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_') && Keyword::lookup(name).is_none()
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {
            depth: 0,
            buffer: String::new(),
        }
    }

    pub fn format(mut self, script: &ScriptModel) -> std::result::Result<String, std::fmt::Error> {
        for statement in &script.statements {
            self.visit_statement(statement)?;
        }
        Ok(self.buffer)
    }

    /// Start a clause: a new line at statement level, a space inside
    /// nested queries.
    fn clause(&mut self, keyword: &str) -> Result {
        if self.depth == 0 {
            write!(self.buffer, "\n{}", keyword)
        } else {
            write!(self.buffer, " {}", keyword)
        }
    }

    fn visit_statement(&mut self, statement: &Statement) -> Result {
        match statement {
            Statement::Comment(c) => return writeln!(self.buffer, "{}", c.text),
            Statement::Select(q) => self.visit_query(q)?,
            Statement::Delete(d) => self.visit_delete(d)?,
            Statement::Use(u) => match &u.target {
                UseTarget::Uri(uri) => write!(self.buffer, "USE {}", Value::String(uri.clone()))?,
                UseTarget::Named(name) => write!(self.buffer, "USE {}", quote_name(name))?,
            },
            Statement::Consume(c) => self.visit_consume(c)?,
            Statement::Import(i) => {
                write!(self.buffer, "IMPORT {}", Value::String(i.source.clone()))?;
                self.visit_options(&i.options)?;
                self.clause("INTO ")?;
                for (idx, target) in i.targets.iter().enumerate() {
                    if idx > 0 {
                        write!(self.buffer, ", ")?;
                    }
                    write!(self.buffer, "@{}", target.name)?;
                }
            }
            Statement::Produce(p) => {
                write!(self.buffer, "PRODUCE {}", Value::String(p.target.clone()))?;
                self.visit_options(&p.options)?;
                self.clause("SELECT ")?;
                self.visit_select_items(&p.payload)?;
                if let Some(from) = &p.from {
                    self.clause("FROM ")?;
                    self.visit_table_expr(from)?;
                }
                if let Some(selection) = &p.selection {
                    self.clause("WHERE ")?;
                    self.visit_expr(selection)?;
                }
            }
            Statement::Request(r) => {
                write!(self.buffer, "REQUEST {}", Value::String(r.target.clone()))?;
                self.visit_options(&r.headers)?;
                if !r.options.is_empty() {
                    self.clause("SELECT ")?;
                    self.visit_select_items(&r.options)?;
                }
                self.clause("INTO ")?;
                write!(self.buffer, "@{}", r.into.name)?;
            }
        }
        writeln!(self.buffer, ";")
    }

    fn visit_options(&mut self, options: &[OptionItem]) -> Result {
        if options.is_empty() {
            return Ok(());
        }
        write!(self.buffer, " WITH (")?;
        for (idx, option) in options.iter().enumerate() {
            if idx > 0 {
                write!(self.buffer, ", ")?;
            }
            if quote_name(&option.key) == option.key {
                write!(self.buffer, "{} = ", option.key)?;
            } else {
                write!(self.buffer, "{} = ", Value::String(option.key.clone()))?;
            }
            self.visit_expr(&option.value)?;
        }
        write!(self.buffer, ")")
    }

    fn visit_consume(&mut self, c: &ConsumeStatement) -> Result {
        write!(self.buffer, "CONSUME ")?;
        if let Some(top) = c.top {
            write!(self.buffer, "TOP {} ", top)?;
        }
        self.visit_select_items(&c.projection)?;
        self.clause("FROM ")?;
        self.visit_table_source(&c.source)?;
        if let Some(selection) = &c.selection {
            self.clause("WHERE ")?;
            self.visit_expr(selection)?;
        }
        if !c.order_by.is_empty() {
            self.clause("ORDER BY ")?;
            self.visit_order_items(&c.order_by)?;
        }
        Ok(())
    }

    fn visit_delete(&mut self, d: &DeleteStatement) -> Result {
        if let Some(with) = &d.with {
            self.visit_with(with)?;
            self.clause("")?;
        }
        write!(self.buffer, "DELETE FROM ")?;
        self.visit_table_source(&d.target)?;
        if !d.output.is_empty() {
            self.clause("OUTPUT ")?;
            self.visit_select_items(&d.output)?;
        }
        if let Some(from) = &d.from {
            self.clause("USING ")?;
            self.visit_table_expr(from)?;
        }
        if let Some(selection) = &d.selection {
            self.clause("WHERE ")?;
            self.visit_expr(selection)?;
        }
        Ok(())
    }

    // ── queries ───────────────────────────────────────────────────────

    fn visit_query(&mut self, q: &Query) -> Result {
        if let Some(with) = &q.with {
            self.visit_with(with)?;
            self.clause("")?;
        }
        self.visit_query_expr(&q.body)?;
        if !q.order_by.is_empty() {
            self.clause("ORDER BY ")?;
            self.visit_order_items(&q.order_by)?;
        }
        if let Some(limit) = &q.limit {
            self.clause("")?;
            write!(self.buffer, "LIMIT {}", limit.count)?;
            if let Some(offset) = limit.offset {
                write!(self.buffer, " OFFSET {}", offset)?;
            }
        }
        Ok(())
    }

    /// Render a query nested inside parentheses.
    fn visit_subquery(&mut self, q: &Query) -> Result {
        self.depth += 1;
        write!(self.buffer, "(")?;
        self.visit_query(q)?;
        write!(self.buffer, ")")?;
        self.depth -= 1;
        Ok(())
    }

    fn visit_with(&mut self, with: &WithClause) -> Result {
        write!(self.buffer, "WITH ")?;
        if with.recursive {
            write!(self.buffer, "RECURSIVE ")?;
        }
        for (idx, cte) in with.iter().enumerate() {
            if idx > 0 {
                write!(self.buffer, ", ")?;
            }
            write!(self.buffer, "{}", quote_name(&cte.name))?;
            if !cte.columns.is_empty() {
                let cols: Vec<_> = cte.columns.iter().map(|c| quote_name(c)).collect();
                write!(self.buffer, " ({})", cols.join(", "))?;
            }
            write!(self.buffer, " AS ")?;
            self.visit_subquery(&cte.query)?;
        }
        Ok(())
    }

    fn visit_query_expr(&mut self, body: &QueryExpr) -> Result {
        match body {
            QueryExpr::Select(s) => self.visit_select(s),
            QueryExpr::Union(u) => {
                self.visit_query_expr(&u.left)?;
                self.clause(if u.all { "UNION ALL " } else { "UNION " })?;
                self.visit_query_expr(&u.right)
            }
            QueryExpr::Grouping(q) => self.visit_subquery(q),
        }
    }

    fn visit_select(&mut self, s: &Select) -> Result {
        write!(self.buffer, "SELECT ")?;
        if s.distinct {
            write!(self.buffer, "DISTINCT ")?;
        }
        if let Some(top) = s.top {
            write!(self.buffer, "TOP {} ", top)?;
        }
        self.visit_select_items(&s.projection)?;
        if let Some(from) = &s.from {
            self.clause("FROM ")?;
            self.visit_table_expr(from)?;
        }
        if let Some(selection) = &s.selection {
            self.clause("WHERE ")?;
            self.visit_expr(selection)?;
        }
        if !s.group_by.is_empty() {
            self.clause("GROUP BY ")?;
            self.visit_expr_list(&s.group_by)?;
        }
        if let Some(having) = &s.having {
            self.clause("HAVING ")?;
            self.visit_expr(having)?;
        }
        Ok(())
    }

    fn visit_select_items(&mut self, items: &[SelectItem]) -> Result {
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 {
                write!(self.buffer, ", ")?;
            }
            self.visit_expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                write!(self.buffer, " AS {}", quote_name(alias))?;
            }
        }
        Ok(())
    }

    fn visit_order_items(&mut self, items: &[OrderItem]) -> Result {
        for (idx, item) in items.iter().enumerate() {
            if idx > 0 {
                write!(self.buffer, ", ")?;
            }
            self.visit_expr(&item.expr)?;
            match item.direction {
                Some(SortOrder::Asc) => write!(self.buffer, " ASC")?,
                Some(SortOrder::Desc) => write!(self.buffer, " DESC")?,
                None => {}
            }
        }
        Ok(())
    }

    fn visit_table_expr(&mut self, t: &TableExpr) -> Result {
        match t {
            TableExpr::Source(s) => self.visit_table_source(s),
            TableExpr::Join(j) => {
                self.visit_table_expr(&j.left)?;
                let keyword = match j.kind {
                    JoinKind::Inner => " JOIN ",
                    JoinKind::Left => " LEFT JOIN ",
                    JoinKind::Right => " RIGHT JOIN ",
                    JoinKind::Full => " FULL JOIN ",
                    JoinKind::Cross => " CROSS JOIN ",
                    JoinKind::Comma => ", ",
                };
                write!(self.buffer, "{}", keyword)?;
                self.visit_table_expr(&j.right)?;
                if let Some(on) = &j.constraint {
                    write!(self.buffer, " ON ")?;
                    self.visit_expr(on)?;
                }
                Ok(())
            }
        }
    }

    fn visit_table_source(&mut self, s: &TableSource) -> Result {
        match &s.relation {
            Relation::Named(id) => self.visit_identifier(id)?,
            Relation::Derived(q) => self.visit_subquery(q)?,
        }
        if let Some(alias) = &s.alias {
            write!(self.buffer, " AS {}", quote_name(alias))?;
        }
        if !s.hints.is_empty() {
            write!(self.buffer, " WITH (")?;
            for (idx, hint) in s.hints.iter().enumerate() {
                if idx > 0 {
                    write!(self.buffer, ", ")?;
                }
                write!(self.buffer, "{}", quote_name(&hint.name))?;
                if !hint.args.is_empty() {
                    let args: Vec<_> = hint
                        .args
                        .iter()
                        .map(|a| {
                            if a.chars().all(|c| c.is_ascii_digit()) {
                                a.clone()
                            } else {
                                quote_name(a)
                            }
                        })
                        .collect();
                    write!(self.buffer, "({})", args.join(", "))?;
                }
            }
            write!(self.buffer, ")")?;
        }
        Ok(())
    }

    // ── expressions ───────────────────────────────────────────────────

    fn visit_identifier(&mut self, id: &Identifier) -> Result {
        let parts: Vec<_> = id.parts.iter().map(|p| quote_name(p)).collect();
        write!(self.buffer, "{}", parts.join("."))
    }

    fn visit_expr_list(&mut self, exprs: &[Expr]) -> Result {
        for (idx, expr) in exprs.iter().enumerate() {
            if idx > 0 {
                write!(self.buffer, ", ")?;
            }
            self.visit_expr(expr)?;
        }
        Ok(())
    }

    fn visit_expr(&mut self, expr: &Expr) -> Result {
        // Expressions never break lines
        self.depth += 1;
        let result = self.write_expr(expr);
        self.depth -= 1;
        result
    }

    fn write_expr(&mut self, expr: &Expr) -> Result {
        match expr {
            Expr::Identifier(id) => self.visit_identifier(id),
            Expr::Literal { value, .. } => write!(self.buffer, "{}", value),
            Expr::Variable { name, .. } => write!(self.buffer, "@{}", name),
            Expr::Wildcard { qualifier, .. } => match qualifier {
                Some(q) => {
                    let parts: Vec<_> = q.split('.').map(quote_name).collect();
                    write!(self.buffer, "{}.*", parts.join("."))
                }
                None => write!(self.buffer, "*"),
            },
            Expr::Binary {
                left, op, right, ..
            } => {
                self.write_expr(left)?;
                write!(self.buffer, " {} ", op)?;
                self.write_expr(right)
            }
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => {
                    write!(self.buffer, "NOT ")?;
                    self.write_expr(operand)
                }
                UnaryOp::Neg => {
                    let inner = render_expr(operand);
                    // `--` would start a comment
                    if inner.starts_with('-') {
                        write!(self.buffer, "- {}", inner)
                    } else {
                        write!(self.buffer, "-{}", inner)
                    }
                }
            },
            Expr::Grouping { inner, .. } => {
                write!(self.buffer, "(")?;
                self.write_expr(inner)?;
                write!(self.buffer, ")")
            }
            Expr::Case(case) => {
                write!(self.buffer, "CASE")?;
                if let Some(operand) = &case.operand {
                    write!(self.buffer, " ")?;
                    self.write_expr(operand)?;
                }
                for when in &case.when_clauses {
                    write!(self.buffer, " WHEN ")?;
                    self.write_expr(&when.condition)?;
                    write!(self.buffer, " THEN ")?;
                    self.write_expr(&when.result)?;
                }
                if let Some(else_result) = &case.else_result {
                    write!(self.buffer, " ELSE ")?;
                    self.write_expr(else_result)?;
                }
                write!(self.buffer, " END")
            }
            Expr::Function(f) => {
                write!(self.buffer, "{}(", quote_name(&f.name))?;
                if f.distinct {
                    write!(self.buffer, "DISTINCT ")?;
                }
                self.visit_expr_list(&f.args)?;
                write!(self.buffer, ")")?;
                if let Some(over) = &f.over {
                    self.write_over(over)?;
                }
                Ok(())
            }
            Expr::IsNull { expr, negated, .. } => {
                self.write_expr(expr)?;
                write!(self.buffer, " IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::InList {
                expr,
                list,
                negated,
                ..
            } => {
                self.write_expr(expr)?;
                write!(self.buffer, " {}IN ", if *negated { "NOT " } else { "" })?;
                match list.as_slice() {
                    [Expr::Subquery { query, .. }] => self.visit_subquery(query),
                    _ => {
                        write!(self.buffer, "(")?;
                        self.visit_expr_list(list)?;
                        write!(self.buffer, ")")
                    }
                }
            }
            Expr::Subquery { query, .. } => self.visit_subquery(query),
            Expr::Exists { query, negated, .. } => {
                write!(self.buffer, "{}EXISTS ", if *negated { "NOT " } else { "" })?;
                self.visit_subquery(query)
            }
        }
    }

    fn write_over(&mut self, over: &OverClause) -> Result {
        write!(self.buffer, " OVER (")?;
        let mut sep = "";
        if !over.partition_by.is_empty() {
            write!(self.buffer, "PARTITION BY ")?;
            self.visit_expr_list(&over.partition_by)?;
            sep = " ";
        }
        if !over.order_by.is_empty() {
            write!(self.buffer, "{}ORDER BY ", sep)?;
            self.visit_order_items(&over.order_by)?;
            sep = " ";
        }
        if let Some(start) = &over.start {
            let frame = match over.frame_type {
                FrameType::Rows => "ROWS",
                FrameType::Range => "RANGE",
            };
            match &over.end {
                Some(end) => write!(
                    self.buffer,
                    "{}{} BETWEEN {} AND {}",
                    sep,
                    frame,
                    frame_bound(start),
                    frame_bound(end)
                )?,
                None => write!(self.buffer, "{}{} {}", sep, frame, frame_bound(start))?,
            }
        }
        write!(self.buffer, ")")
    }
}

/// Source text of a frame bound, turning the sentinels back into keywords.
pub fn frame_bound(bound: &FrameBound) -> String {
    let side = match bound.side {
        FrameSide::Preceding => "PRECEDING",
        FrameSide::Following => "FOLLOWING",
    };
    match bound.extent {
        UNBOUNDED => format!("UNBOUNDED {}", side),
        CURRENT_ROW => "CURRENT ROW".to_string(),
        n => format!("{} {}", n, side),
    }
}
