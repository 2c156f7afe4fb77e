//! CTE (Common Table Expression) SQL generation.

use crate::ast::WithClause;
use crate::error::UnsupportedFeatureError;
use crate::transpiler::dml::select::build_query;
use crate::transpiler::writer::SqlWriter;

/// Generate the WITH chain in declaration order, without a trailing space.
///
/// SQL Server has no RECURSIVE keyword; a CTE referring to itself is
/// recursive there by construction.
pub(crate) fn build_with(w: &mut SqlWriter, with: &WithClause) -> Result<String, UnsupportedFeatureError> {
    let mut sql = String::from("WITH ");
    if with.recursive {
        sql.push_str(w.generator.recursive_keyword());
    }

    let mut parts = Vec::new();
    for cte in with.iter() {
        let mut part = w.name(&cte.name);
        if !cte.columns.is_empty() {
            let cols: Vec<String> = cte.columns.iter().map(|c| w.name(c)).collect();
            part.push_str(&format!(" ({})", cols.join(", ")));
        }
        part.push_str(" AS (");
        part.push_str(&build_query(w, &cte.query)?);
        part.push(')');
        parts.push(part);
    }
    sql.push_str(&parts.join(", "));
    Ok(sql)
}
