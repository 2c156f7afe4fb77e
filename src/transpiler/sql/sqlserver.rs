use crate::ast::{FrameType, OverClause, TableHint};
use crate::error::UnsupportedFeatureError;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{DeleteStyle, SqlGenerator, hint_args, needs_quoting};

/// Table hints passed through to the command; anything else is rejected.
const TABLE_HINTS: &[&str] = &[
    "NOLOCK",
    "READUNCOMMITTED",
    "READCOMMITTED",
    "READCOMMITTEDLOCK",
    "READPAST",
    "REPEATABLEREAD",
    "SERIALIZABLE",
    "HOLDLOCK",
    "UPDLOCK",
    "XLOCK",
    "ROWLOCK",
    "PAGLOCK",
    "TABLOCK",
    "TABLOCKX",
    "NOWAIT",
    "FORCESEEK",
    "FORCESCAN",
    "INDEX",
];

pub struct SqlServerGenerator;

impl SqlGenerator for SqlServerGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn quote_identifier(&self, id: &str) -> String {
        if needs_quoting(id) {
            format!("[{}]", id.replace(']', "]]"))
        } else {
            id.to_string()
        }
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{}", index)
    }

    /// `CONCAT(..)` rather than `+`, which adds numeric operands.
    fn string_concat(&self, parts: &[&str]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    /// `OFFSET n ROWS FETCH NEXT m ROWS ONLY`; the caller guarantees an
    /// ORDER BY precedes it.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = String::new();
        if limit.is_some() || offset.is_some() {
            sql.push_str(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
            if let Some(lim) = limit {
                sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", lim));
            }
        }
        sql
    }

    fn uses_top(&self) -> bool {
        true
    }

    fn recursive_keyword(&self) -> &'static str {
        ""
    }

    fn table_hints(&self, hints: &[TableHint]) -> Result<String, UnsupportedFeatureError> {
        if hints.is_empty() {
            return Ok(String::new());
        }
        let rendered = hints
            .iter()
            .map(|hint| {
                let name = hint.name.to_ascii_uppercase();
                if !TABLE_HINTS.contains(&name.as_str()) {
                    return Err(self.unsupported(&format!("table hint {}", hint.name)));
                }
                match (hint.is_index(), hint.args.is_empty()) {
                    (false, true) => Ok(name),
                    (true, false) => Ok(format!("{}({})", name, hint_args(self, &hint.args))),
                    (true, true) => Err(self.unsupported("INDEX hint without an index")),
                    (false, false) => Err(self.unsupported(&format!("arguments to table hint {}", name))),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!(" WITH ({})", rendered.join(", ")))
    }

    /// RANGE frames only take UNBOUNDED and CURRENT ROW bounds.
    fn check_frame(&self, over: &OverClause) -> Result<(), UnsupportedFeatureError> {
        if over.frame_type == FrameType::Range
            && over
                .bounds()
                .any(|b| !b.is_unbounded() && !b.is_current_row())
        {
            return Err(self.unsupported("RANGE frame with a row offset"));
        }
        Ok(())
    }

    fn delete_style(&self) -> DeleteStyle {
        DeleteStyle::Output
    }
}
