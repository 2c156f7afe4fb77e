//! # sqlweave
//!
//! One script, many backends. A SQL-family scripting language whose scripts
//! mix relational statements with integration verbs (USE, CONSUME, PRODUCE,
//! REQUEST, IMPORT) and run unchanged against Postgres, MySQL and SQL Server
//! as well as queue, HTTP and file transports.
//!
//! ## Quick Example
//!
//! ```rust
//! use sqlweave::prelude::*;
//!
//! let catalog = MemoryCatalog::new().with_table("users", &[("id", DataType::Int)]);
//! let bound = sqlweave::compile("SELECT id FROM users WHERE id = 7", &catalog).unwrap();
//!
//! let compiled = generate(&bound, Dialect::SqlServer).unwrap();
//! let command = compiled[0].command.as_ref().unwrap();
//! assert_eq!(command.text, "SELECT id FROM users WHERE id = @p1");
//! ```
//!
//! ## Pipeline
//!
//! | Stage       | Module                    | Output          |
//! |-------------|---------------------------|-----------------|
//! | Tokenize    | [`lexer`]                 | `Vec<Token>`    |
//! | Parse       | [`parser`]                | `ScriptModel`   |
//! | Bind        | [`binder`]                | `BoundScript`   |
//! | Generate    | [`transpiler`]            | `Command`s      |
//! | Execute     | [`engine`]                | `ExecutionReport` |

pub mod ast;
pub mod binder;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fmt;
pub mod lexer;
pub mod parser;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::binder::{BoundScript, Catalog, MemoryCatalog, bind};
    pub use crate::cache::ScriptCache;
    pub use crate::config::WeaveConfig;
    pub use crate::engine::{ExecutionContext, ExecutionReport, ScriptExecutor, StatementOutcome, VarValue};
    pub use crate::error::*;
    pub use crate::fmt::format_script;
    pub use crate::transpiler::{Command, Dialect, ToSql, generate};
}

/// Parse script text into a script model.
///
/// # Example
///
/// ```
/// let script = sqlweave::parse("-- hi\nUSE 'queue://broker'").unwrap();
/// assert_eq!(script.len(), 2);
/// ```
pub fn parse(text: &str) -> error::WeaveResult<ast::ScriptModel> {
    parser::parse_script(text)
}

/// Parse and bind script text against a catalog.
pub fn compile(text: &str, catalog: &dyn binder::Catalog) -> error::WeaveResult<binder::BoundScript> {
    let script = parse(text)?;
    Ok(binder::bind(script, catalog)?)
}
