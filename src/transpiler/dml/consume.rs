//! CONSUME and PRODUCE against a database target.
//!
//! Both read rows the way a SELECT does, so they are rewritten into one
//! and rendered by the SELECT builder.

use crate::ast::*;

/// `CONSUME TOP n cols FROM src WHERE .. ORDER BY ..` as a query.
pub(crate) fn consume_query(consume: &ConsumeStatement) -> Query {
    let mut select = Select::new(consume.projection.clone(), consume.span);
    select.from = Some(TableExpr::Source(consume.source.clone()));
    select.selection = consume.selection.clone();

    let mut query = Query::new(QueryExpr::Select(Box::new(select)), consume.span);
    query.order_by = consume.order_by.clone();
    query.limit = consume.top.map(|count| Limit {
        count,
        offset: None,
    });
    query
}

/// The rows a PRODUCE sends: its payload over its relation.
pub(crate) fn produce_query(produce: &ProduceStatement) -> Query {
    let mut select = Select::new(produce.payload.clone(), produce.span);
    select.from = produce.from.clone();
    select.selection = produce.selection.clone();
    Query::new(QueryExpr::Select(Box::new(select)), produce.span)
}
