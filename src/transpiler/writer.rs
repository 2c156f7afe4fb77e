//! Expression rendering shared by every statement builder.
//!
//! The writer owns the parameter list of the command being built. Text must
//! be produced in output order so positional placeholders line up with
//! their parameters.

use crate::ast::*;
use crate::error::UnsupportedFeatureError;
use crate::transpiler::dml::{select, window};
use crate::transpiler::traits::SqlGenerator;
use crate::transpiler::{Command, Param, ParamValue};

type Result<T> = std::result::Result<T, UnsupportedFeatureError>;

/// Qualifier substitution applied while rendering a DELETE output list.
#[derive(Debug, Clone)]
pub(crate) struct OutputRewrite {
    /// Visible name of the delete target.
    pub target: String,
    /// Text written in place of `deleted` or the target name.
    pub replacement: String,
    /// Also prefix unqualified target columns and bare `*`.
    pub qualify_bare: bool,
}

pub(crate) struct SqlWriter<'g> {
    pub generator: &'g dyn SqlGenerator,
    params: Vec<Param>,
    pub output: Option<OutputRewrite>,
}

impl<'g> SqlWriter<'g> {
    pub fn new(generator: &'g dyn SqlGenerator) -> Self {
        Self {
            generator,
            params: Vec::new(),
            output: None,
        }
    }

    pub fn finish(self, text: String) -> Command {
        Command {
            text,
            params: self.params,
        }
    }

    fn bind(&mut self, value: ParamValue) -> String {
        let index = self.params.len() + 1;
        let placeholder = self.generator.placeholder(index);
        self.params.push(Param {
            index,
            placeholder: placeholder.clone(),
            value,
        });
        placeholder
    }

    pub fn name(&self, name: &str) -> String {
        self.generator.quote_identifier(name)
    }

    fn dotted(&self, parts: &[String]) -> String {
        parts
            .iter()
            .map(|p| self.name(p))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Replacement for a qualifier while an output rewrite is active.
    fn rewrite_qualifier(&self, qualifier: &str) -> Option<String> {
        let rewrite = self.output.as_ref()?;
        if qualifier.eq_ignore_ascii_case("deleted") || qualifier.eq_ignore_ascii_case(&rewrite.target) {
            Some(rewrite.replacement.clone())
        } else {
            None
        }
    }

    pub fn identifier(&self, id: &Identifier) -> String {
        if let Some(qualifier) = id.qualifier()
            && let Some(replacement) = self.rewrite_qualifier(qualifier)
        {
            return format!("{}.{}", replacement, self.name(id.name()));
        }
        if id.parts.len() == 1
            && let Some(rewrite) = &self.output
            && rewrite.qualify_bare
            && let Some(Resolution {
                binding: Binding::Column { source, .. },
                ..
            }) = &id.resolution
            && source.eq_ignore_ascii_case(&rewrite.target)
        {
            return format!("{}.{}", rewrite.replacement, self.name(id.name()));
        }
        self.dotted(&id.parts)
    }

    fn wildcard(&self, qualifier: &Option<String>) -> String {
        match qualifier {
            Some(q) => match self.rewrite_qualifier(q) {
                Some(replacement) => format!("{}.*", replacement),
                None => {
                    let parts: Vec<String> = q.split('.').map(String::from).collect();
                    format!("{}.*", self.dotted(&parts))
                }
            },
            None => match &self.output {
                Some(rewrite) if rewrite.qualify_bare => format!("{}.*", rewrite.replacement),
                _ => "*".to_string(),
            },
        }
    }

    pub fn expr_list(&mut self, exprs: &[Expr]) -> Result<String> {
        let mut parts = Vec::with_capacity(exprs.len());
        for expr in exprs {
            parts.push(self.expr(expr)?);
        }
        Ok(parts.join(", "))
    }

    pub fn select_items(&mut self, items: &[SelectItem]) -> Result<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let mut sql = self.expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                sql.push_str(" AS ");
                sql.push_str(&self.name(alias));
            }
            parts.push(sql);
        }
        Ok(parts.join(", "))
    }

    pub fn order_items(&mut self, items: &[OrderItem]) -> Result<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            let mut sql = self.expr(&item.expr)?;
            match item.direction {
                Some(SortOrder::Asc) => sql.push_str(" ASC"),
                Some(SortOrder::Desc) => sql.push_str(" DESC"),
                None => {}
            }
            parts.push(sql);
        }
        Ok(parts.join(", "))
    }

    pub fn expr(&mut self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Identifier(id) => Ok(self.identifier(id)),
            // NULL carries no value
            Expr::Literal {
                value: Value::Null, ..
            } => Ok("NULL".to_string()),
            Expr::Literal { value, .. } => Ok(self.bind(ParamValue::Literal(value.clone()))),
            Expr::Variable { name, .. } => Ok(self.bind(ParamValue::Variable(name.clone()))),
            Expr::Wildcard { qualifier, .. } => Ok(self.wildcard(qualifier)),
            Expr::Binary {
                op: BinaryOp::Concat,
                ..
            } => {
                let mut operands = Vec::new();
                collect_concat(expr, &mut operands);
                let mut parts = Vec::with_capacity(operands.len());
                for operand in operands {
                    parts.push(self.operand(operand, BinaryOp::Concat.precedence(), false)?);
                }
                let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
                Ok(self.generator.string_concat(&refs))
            }
            Expr::Binary {
                left, op, right, ..
            } => {
                let l = self.operand(left, op.precedence(), false)?;
                let r = self.operand(right, op.precedence(), true)?;
                Ok(format!("{} {} {}", l, op, r))
            }
            Expr::Unary { op, operand, .. } => {
                let inner = self.expr(operand)?;
                Ok(match op {
                    UnaryOp::Not => format!("NOT {}", inner),
                    UnaryOp::Neg if inner.starts_with('-') => format!("- {}", inner),
                    UnaryOp::Neg => format!("-{}", inner),
                })
            }
            Expr::Grouping { inner, .. } => Ok(format!("({})", self.expr(inner)?)),
            Expr::Case(case) => {
                let mut sql = String::from("CASE");
                if let Some(operand) = &case.operand {
                    sql.push(' ');
                    sql.push_str(&self.expr(operand)?);
                }
                for when in &case.when_clauses {
                    sql.push_str(" WHEN ");
                    sql.push_str(&self.expr(&when.condition)?);
                    sql.push_str(" THEN ");
                    sql.push_str(&self.expr(&when.result)?);
                }
                if let Some(else_result) = &case.else_result {
                    sql.push_str(" ELSE ");
                    sql.push_str(&self.expr(else_result)?);
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expr::Function(function) => {
                let mut sql = if function
                    .name
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_')
                {
                    function.name.clone()
                } else {
                    self.name(&function.name)
                };
                sql.push('(');
                if function.distinct {
                    sql.push_str("DISTINCT ");
                }
                sql.push_str(&self.expr_list(&function.args)?);
                sql.push(')');
                if let Some(over) = &function.over {
                    sql.push_str(&window::build_over(self, over)?);
                }
                Ok(sql)
            }
            Expr::IsNull { expr, negated, .. } => Ok(format!(
                "{} IS {}NULL",
                self.expr(expr)?,
                if *negated { "NOT " } else { "" }
            )),
            Expr::InList {
                expr,
                list,
                negated,
                ..
            } => {
                let lhs = self.expr(expr)?;
                let keyword = if *negated { "NOT IN" } else { "IN" };
                let rhs = match list.as_slice() {
                    [Expr::Subquery { query, .. }] => self.subquery(query)?,
                    _ => format!("({})", self.expr_list(list)?),
                };
                Ok(format!("{} {} {}", lhs, keyword, rhs))
            }
            Expr::Subquery { query, .. } => self.subquery(query),
            Expr::Exists { query, negated, .. } => Ok(format!(
                "{}EXISTS {}",
                if *negated { "NOT " } else { "" },
                self.subquery(query)?
            )),
        }
    }

    /// Render a binary operand, adding parentheses only when the tree
    /// nests a looser operator without an explicit group.
    fn operand(&mut self, child: &Expr, parent: u8, right: bool) -> Result<String> {
        let sql = self.expr(child)?;
        match child {
            Expr::Binary { op, .. } if op.precedence() < parent || (right && op.precedence() == parent) => {
                Ok(format!("({})", sql))
            }
            _ => Ok(sql),
        }
    }

    pub fn subquery(&mut self, query: &Query) -> Result<String> {
        // Output rewrites never reach into nested queries
        let output = self.output.take();
        let sql = select::build_query(self, query);
        self.output = output;
        Ok(format!("({})", sql?))
    }
}

/// Flatten a left-leaning `||` chain into its operands.
fn collect_concat<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary {
            left,
            op: BinaryOp::Concat,
            right,
            ..
        } => {
            collect_concat(left, out);
            collect_concat(right, out);
        }
        other => out.push(other),
    }
}
