use crate::ast::TableHint;
use crate::error::UnsupportedFeatureError;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{DeleteStyle, SqlGenerator, needs_quoting};

pub struct PostgresGenerator;

impl Default for PostgresGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        if needs_quoting(name) {
            format!("\"{}\"", name.replace('"', "\"\""))
        } else {
            name.to_string()
        }
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn string_concat(&self, parts: &[&str]) -> String {
        parts.join(" || ")
    }

    fn table_hints(&self, hints: &[TableHint]) -> Result<String, UnsupportedFeatureError> {
        match hints.first() {
            None => Ok(String::new()),
            Some(hint) => Err(self.unsupported(&format!("table hint {}", hint.name))),
        }
    }

    fn delete_style(&self) -> DeleteStyle {
        DeleteStyle::Using
    }
}
