//! SELECT SQL generation.

use crate::ast::*;
use crate::error::UnsupportedFeatureError;
use crate::transpiler::dml::cte::build_with;
use crate::transpiler::writer::SqlWriter;

type Result<T> = std::result::Result<T, UnsupportedFeatureError>;

/// Where a query's row limit ends up.
struct LimitPlan {
    /// `TOP (n)` on the body's SELECT.
    top: Option<u64>,
    /// Clause appended after ORDER BY.
    tail: String,
}

/// Generate a full query: WITH chain, body, ORDER BY and row limit.
pub(crate) fn build_query(w: &mut SqlWriter, query: &Query) -> Result<String> {
    let mut sql = String::new();
    if let Some(with) = &query.with {
        sql.push_str(&build_with(w, with)?);
        sql.push(' ');
    }

    // TOP on the only SELECT is the query's row limit
    let mut limit = query.limit;
    if let QueryExpr::Select(select) = &query.body
        && let Some(top) = select.top
    {
        limit = Some(match limit {
            Some(l) => Limit {
                count: l.count.min(top),
                offset: l.offset,
            },
            None => Limit {
                count: top,
                offset: None,
            },
        });
    }
    let plan = plan_limit(w, query, limit)?;

    match &query.body {
        QueryExpr::Select(select) => sql.push_str(&build_select(w, select, plan.top)?),
        body => sql.push_str(&build_query_expr(w, body)?),
    }
    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&w.order_items(&query.order_by)?);
    }
    sql.push_str(&plan.tail);
    Ok(sql)
}

fn plan_limit(w: &SqlWriter, query: &Query, limit: Option<Limit>) -> Result<LimitPlan> {
    let generator = w.generator;
    let Some(limit) = limit else {
        return Ok(LimitPlan {
            top: None,
            tail: String::new(),
        });
    };
    if !generator.uses_top() {
        return Ok(LimitPlan {
            top: None,
            tail: generator.limit_offset(Some(limit.count), limit.offset),
        });
    }

    let plain = matches!(query.body, QueryExpr::Select(_));
    let ordered = !query.order_by.is_empty();
    match (limit.offset, plain, ordered) {
        (None, true, _) => Ok(LimitPlan {
            top: Some(limit.count),
            tail: String::new(),
        }),
        (Some(_), _, false) => Err(generator.unsupported("LIMIT with OFFSET but no ORDER BY")),
        (_, _, true) => Ok(LimitPlan {
            top: None,
            tail: generator.limit_offset(Some(limit.count), limit.offset),
        }),
        // Unordered UNION: any row order is acceptable
        (None, false, false) => Ok(LimitPlan {
            top: None,
            tail: format!(
                " ORDER BY (SELECT NULL){}",
                generator.limit_offset(Some(limit.count), None)
            ),
        }),
    }
}

/// A UNION operand or parenthesized query.
fn build_query_expr(w: &mut SqlWriter, body: &QueryExpr) -> Result<String> {
    match body {
        QueryExpr::Select(select) => match select.top {
            Some(top) if !w.generator.uses_top() => Ok(format!(
                "({}{})",
                build_select(w, select, None)?,
                w.generator.limit_offset(Some(top), None)
            )),
            top => build_select(w, select, top),
        },
        QueryExpr::Union(union) => {
            let left = build_query_expr(w, &union.left)?;
            let right = build_query_expr(w, &union.right)?;
            let keyword = if union.all { "UNION ALL" } else { "UNION" };
            Ok(format!("{} {} {}", left, keyword, right))
        }
        QueryExpr::Grouping(query) => Ok(format!("({})", build_query(w, query)?)),
    }
}

/// One SELECT block. `top` is only written by dialects that use TOP.
pub(crate) fn build_select(w: &mut SqlWriter, select: &Select, top: Option<u64>) -> Result<String> {
    let mut sql = String::from("SELECT ");
    if select.distinct {
        sql.push_str("DISTINCT ");
    }
    if let Some(n) = top
        && w.generator.uses_top()
    {
        sql.push_str(&format!("TOP ({}) ", n));
    }
    sql.push_str(&w.select_items(&select.projection)?);

    if let Some(from) = &select.from {
        sql.push_str(" FROM ");
        sql.push_str(&build_table_expr(w, from)?);
    }
    if let Some(selection) = &select.selection {
        sql.push_str(" WHERE ");
        sql.push_str(&w.expr(selection)?);
    }
    if !select.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&w.expr_list(&select.group_by)?);
    }
    if let Some(having) = &select.having {
        sql.push_str(" HAVING ");
        sql.push_str(&w.expr(having)?);
    }
    Ok(sql)
}

pub(crate) fn build_table_expr(w: &mut SqlWriter, table: &TableExpr) -> Result<String> {
    match table {
        TableExpr::Source(source) => build_table_source(w, source),
        TableExpr::Join(join) => {
            let mut sql = build_table_expr(w, &join.left)?;
            sql.push_str(w.generator.join_keyword(join.kind)?);
            sql.push_str(&build_table_expr(w, &join.right)?);
            if let Some(on) = &join.constraint {
                sql.push_str(" ON ");
                sql.push_str(&w.expr(on)?);
            }
            Ok(sql)
        }
    }
}

pub(crate) fn build_table_source(w: &mut SqlWriter, source: &TableSource) -> Result<String> {
    let mut sql = match &source.relation {
        Relation::Named(id) => w.identifier(id),
        Relation::Derived(query) => w.subquery(query)?,
    };
    if let Some(alias) = &source.alias {
        sql.push_str(" AS ");
        sql.push_str(&w.name(alias));
    }
    sql.push_str(&w.generator.table_hints(&source.hints)?);
    Ok(sql)
}
