//! Transpiler test modules.
//!
//! - `core`: SELECT-family generation and parameterization
//! - `dialects`: DELETE styles, hints, limits and unsupported constructs

mod dialects;

use crate::ast::DataType;
use crate::binder::{MemoryCatalog, bind};
use crate::error::UnsupportedFeatureError;
use crate::parser::parse_script;
use crate::transpiler::{Command, CompiledStatement, Dialect, generate};

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with_table("users", &[("id", DataType::Int), ("email", DataType::Text)])
        .with_table(
            "orders",
            &[
                ("id", DataType::Int),
                ("user_id", DataType::Int),
                ("total", DataType::Float),
            ],
        )
        .with_table("inbox", &[("id", DataType::Int), ("body", DataType::Text)])
        .with_table("events", &[("user", DataType::Text), ("order", DataType::Int)])
}

fn compile_all(text: &str, dialect: Dialect) -> Result<Vec<CompiledStatement>, UnsupportedFeatureError> {
    let script = parse_script(text).unwrap();
    let bound = bind(script, &catalog()).unwrap();
    generate(&bound, dialect)
}

/// First command the script generates.
fn compile(text: &str, dialect: Dialect) -> Result<Command, UnsupportedFeatureError> {
    let compiled = compile_all(text, dialect)?;
    Ok(compiled.into_iter().find_map(|c| c.command).unwrap())
}

fn sql(text: &str, dialect: Dialect) -> String {
    compile(text, dialect)
        .unwrap_or_else(|e| panic!("{text}: {e}"))
        .text
}
