use crate::ast::{JoinKind, TableHint};
use crate::error::UnsupportedFeatureError;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{DeleteStyle, SqlGenerator, hint_args, needs_quoting};

pub struct MysqlGenerator;

impl SqlGenerator for MysqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            format!("`{}`", name.replace('`', "``"))
        } else {
            name.to_string()
        }
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn string_concat(&self, parts: &[&str]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn join_keyword(&self, kind: JoinKind) -> Result<&'static str, UnsupportedFeatureError> {
        match kind {
            JoinKind::Full => Err(self.unsupported("FULL JOIN")),
            JoinKind::Inner => Ok(" JOIN "),
            JoinKind::Left => Ok(" LEFT JOIN "),
            JoinKind::Right => Ok(" RIGHT JOIN "),
            JoinKind::Cross => Ok(" CROSS JOIN "),
            JoinKind::Comma => Ok(", "),
        }
    }

    /// Only index hints have a MySQL spelling.
    fn table_hints(&self, hints: &[TableHint]) -> Result<String, UnsupportedFeatureError> {
        let mut sql = String::new();
        for hint in hints {
            if !hint.is_index() {
                return Err(self.unsupported(&format!("table hint {}", hint.name)));
            }
            sql.push_str(&format!(" FORCE INDEX ({})", hint_args(self, &hint.args)));
        }
        Ok(sql)
    }

    fn delete_style(&self) -> DeleteStyle {
        DeleteStyle::Joined
    }
}
