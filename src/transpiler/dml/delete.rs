//! DELETE SQL generation.
//!
//! The script has one FROM/USING relation; each dialect decides how the
//! target and that relation are spelled.

use crate::ast::*;
use crate::error::UnsupportedFeatureError;
use crate::transpiler::dml::cte::build_with;
use crate::transpiler::dml::select::{build_table_expr, build_table_source};
use crate::transpiler::traits::DeleteStyle;
use crate::transpiler::writer::{OutputRewrite, SqlWriter};

type Result<T> = std::result::Result<T, UnsupportedFeatureError>;

pub(crate) fn build_delete(w: &mut SqlWriter, delete: &DeleteStatement) -> Result<String> {
    let mut sql = String::new();
    if let Some(with) = &delete.with {
        sql.push_str(&build_with(w, with)?);
        sql.push(' ');
    }

    let target = delete.target.visible_name().unwrap_or_default().to_string();
    // The source of the relation the target names, if any
    let joined_target = delete.from.as_ref().and_then(|from| {
        from.sources()
            .into_iter()
            .find(|s| s.visible_name().is_some_and(|n| n.eq_ignore_ascii_case(&target)))
    });

    match w.generator.delete_style() {
        DeleteStyle::Using => build_using(w, delete, &target, joined_target, &mut sql)?,
        DeleteStyle::Joined => {
            if !delete.output.is_empty() {
                return Err(w.generator.unsupported("DELETE ... OUTPUT"));
            }
            build_joined(w, delete, &target, joined_target.is_some(), &mut sql)?;
        }
        DeleteStyle::Output => build_joined(w, delete, &target, joined_target.is_some(), &mut sql)?,
    }
    Ok(sql)
}

/// `DELETE FROM t USING r WHERE .. RETURNING ..`
///
/// USING takes a plain list, so inner joins are flattened with their ON
/// predicates moved into WHERE, and the target leaves the list.
fn build_using(
    w: &mut SqlWriter,
    delete: &DeleteStatement,
    target: &str,
    joined_target: Option<&TableSource>,
    sql: &mut String,
) -> Result<()> {
    let mut sources = Vec::new();
    let mut predicates = Vec::new();
    if let Some(from) = &delete.from {
        if from.join_kinds().iter().any(JoinKind::is_outer) {
            return Err(w.generator.unsupported("outer join in DELETE ... USING"));
        }
        flatten(from, &mut sources, &mut predicates);
    }

    sql.push_str("DELETE FROM ");
    sql.push_str(&build_table_source(w, joined_target.unwrap_or(&delete.target))?);

    let using: Vec<&TableSource> = sources
        .into_iter()
        .filter(|s| !s.visible_name().is_some_and(|n| n.eq_ignore_ascii_case(target)))
        .collect();
    if !using.is_empty() {
        let mut parts = Vec::with_capacity(using.len());
        for source in using {
            parts.push(build_table_source(w, source)?);
        }
        sql.push_str(" USING ");
        sql.push_str(&parts.join(", "));
    }

    if let Some(selection) = &delete.selection {
        predicates.push(selection);
    }
    if !predicates.is_empty() {
        let mut parts = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            parts.push(conjunct(w, predicate)?);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(" AND "));
    }

    if !delete.output.is_empty() {
        let replacement = w.name(target);
        sql.push_str(" RETURNING ");
        sql.push_str(&with_output(w, target, replacement, false, &delete.output)?);
    }
    Ok(())
}

/// `DELETE t [OUTPUT ..] FROM t JOIN r .. WHERE ..`, or the single-table
/// `DELETE FROM t ..` when there is no relation.
fn build_joined(
    w: &mut SqlWriter,
    delete: &DeleteStatement,
    target: &str,
    target_in_from: bool,
    sql: &mut String,
) -> Result<()> {
    let output = if delete.output.is_empty() {
        String::new()
    } else {
        format!(
            " OUTPUT {}",
            with_output(w, target, "DELETED".to_string(), true, &delete.output)?
        )
    };

    match &delete.from {
        None => {
            sql.push_str("DELETE FROM ");
            sql.push_str(&build_table_source(w, &delete.target)?);
            sql.push_str(&output);
        }
        Some(from) => {
            sql.push_str("DELETE ");
            sql.push_str(&w.name(target));
            sql.push_str(&output);
            sql.push_str(" FROM ");
            if !target_in_from {
                sql.push_str(&build_table_source(w, &delete.target)?);
                sql.push_str(", ");
            }
            sql.push_str(&build_table_expr(w, from)?);
        }
    }

    if let Some(selection) = &delete.selection {
        sql.push_str(" WHERE ");
        sql.push_str(&w.expr(selection)?);
    }
    Ok(())
}

fn with_output(
    w: &mut SqlWriter,
    target: &str,
    replacement: String,
    qualify_bare: bool,
    items: &[SelectItem],
) -> Result<String> {
    w.output = Some(OutputRewrite {
        target: target.to_string(),
        replacement,
        qualify_bare,
    });
    let rendered = w.select_items(items);
    w.output = None;
    rendered
}

/// An AND operand; OR-rooted predicates keep their meaning in parentheses.
fn conjunct(w: &mut SqlWriter, predicate: &Expr) -> Result<String> {
    let sql = w.expr(predicate)?;
    match predicate {
        Expr::Binary {
            op: BinaryOp::Or, ..
        } => Ok(format!("({})", sql)),
        _ => Ok(sql),
    }
}

fn flatten<'a>(table: &'a TableExpr, sources: &mut Vec<&'a TableSource>, predicates: &mut Vec<&'a Expr>) {
    match table {
        TableExpr::Source(source) => sources.push(source),
        TableExpr::Join(join) => {
            flatten(&join.left, sources, predicates);
            flatten(&join.right, sources, predicates);
            if let Some(on) = &join.constraint {
                predicates.push(on);
            }
        }
    }
}
