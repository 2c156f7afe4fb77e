//! SQL Transpiler for bound weave scripts.
//!
//! Converts relational statements into parameterized commands for one
//! dialect. Every literal and variable becomes a parameter; only grammar
//! integers (TOP, LIMIT, OFFSET, frame extents) are written inline.

pub mod dialect;
pub(crate) mod dml;
pub mod sql;
pub mod traits;
mod writer;

#[cfg(test)]
mod tests;

use serde::Serialize;

use crate::ast::*;
use crate::binder::BoundScript;
use crate::error::UnsupportedFeatureError;
pub use dialect::Dialect;
pub use traits::SqlGenerator;
use writer::SqlWriter;

/// A generated command and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub text: String,
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    /// 1-based position.
    pub index: usize,
    /// Placeholder as written in the text (`$1`, `?`, `@p1`).
    pub placeholder: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamValue {
    Literal(Value),
    /// Filled from the script variable of this name at execution time.
    Variable(String),
}

/// Generation result for one script statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStatement {
    /// Position of the statement in the script.
    pub index: usize,
    pub verb: &'static str,
    /// `None` for statements that never reach a database.
    pub command: Option<Command>,
}

/// Trait for converting AST nodes to SQL.
pub trait ToSql {
    /// Convert this node to SQL using the default dialect.
    fn to_sql(&self) -> Result<Command, UnsupportedFeatureError> {
        self.to_sql_with_dialect(Dialect::default())
    }
    /// Convert this node to SQL with a specific dialect.
    fn to_sql_with_dialect(&self, dialect: Dialect) -> Result<Command, UnsupportedFeatureError>;
}

fn render<F>(dialect: Dialect, build: F) -> Result<Command, UnsupportedFeatureError>
where
    F: FnOnce(&mut SqlWriter) -> Result<String, UnsupportedFeatureError>,
{
    let generator = dialect.generator();
    let mut writer = SqlWriter::new(generator.as_ref());
    let text = build(&mut writer)?;
    Ok(writer.finish(text))
}

impl ToSql for Query {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> Result<Command, UnsupportedFeatureError> {
        render(dialect, |w| dml::select::build_query(w, self))
    }
}

impl ToSql for DeleteStatement {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> Result<Command, UnsupportedFeatureError> {
        render(dialect, |w| dml::delete::build_delete(w, self))
    }
}

impl ToSql for ConsumeStatement {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> Result<Command, UnsupportedFeatureError> {
        let query = dml::consume::consume_query(self);
        render(dialect, |w| dml::select::build_query(w, &query))
    }
}

impl ToSql for ProduceStatement {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> Result<Command, UnsupportedFeatureError> {
        let query = dml::consume::produce_query(self);
        render(dialect, |w| dml::select::build_query(w, &query))
    }
}

/// Command for one statement, if it has a relational form.
///
/// PRODUCE only needs the database when its payload reads a relation.
pub fn generate_statement(
    statement: &Statement,
    dialect: Dialect,
) -> Result<Option<Command>, UnsupportedFeatureError> {
    match statement {
        Statement::Select(query) => query.to_sql_with_dialect(dialect).map(Some),
        Statement::Delete(delete) => delete.to_sql_with_dialect(dialect).map(Some),
        Statement::Consume(consume) => consume.to_sql_with_dialect(dialect).map(Some),
        Statement::Produce(produce) if produce.from.is_some() => {
            produce.to_sql_with_dialect(dialect).map(Some)
        }
        Statement::Produce(_)
        | Statement::Use(_)
        | Statement::Comment(_)
        | Statement::Import(_)
        | Statement::Request(_) => Ok(None),
    }
}

/// Generate every statement of a bound script for one dialect, stopping at
/// the first construct the dialect cannot express.
pub fn generate(script: &BoundScript, dialect: Dialect) -> Result<Vec<CompiledStatement>, UnsupportedFeatureError> {
    script
        .statements()
        .iter()
        .enumerate()
        .map(|(index, statement)| {
            Ok(CompiledStatement {
                index,
                verb: statement.verb(),
                command: generate_statement(statement, dialect)?,
            })
        })
        .collect()
}
