//! Script execution engine.
//!
//! Walks a bound script in source order. Relational statements go through
//! the dialect generator to a [`QueryBackend`]; integration verbs go to the
//! [`Transport`] registered for the URL scheme. The first failing statement
//! stops the script and nothing already done is undone.

pub mod backend;
pub mod context;
pub mod eval;
pub mod file;
pub mod http;
pub mod memory;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::ast::{ConsumeStatement, ImportStatement, ProduceStatement, RequestStatement, Statement, UseStatement, UseTarget, Value};
use crate::binder::BoundScript;
use crate::error::ExecutionError;
use crate::transpiler::{Command, Dialect, ParamValue, generate_statement};

pub use backend::{QueryBackend, SqlxBackend};
pub use context::{ExecutionContext, Target, VarValue};
pub use eval::Evaluator;
pub use file::FileTransport;
pub use http::HttpTransport;
pub use memory::MemoryQueue;
pub use transport::{ConsumeRequest, Transport, TransportRegistry};

/// One row or message: column name to value, in column order.
pub type Record = IndexMap<String, Value>;

/// What a statement did.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// Comments do nothing.
    Skipped,
    /// USE switched the active target (described without credentials).
    TargetChanged(String),
    Rows(Vec<Record>),
    Affected(u64),
    Produced(usize),
    /// IMPORT or REQUEST wrote these variables.
    Bound { variables: Vec<String>, rows: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub index: usize,
    pub verb: &'static str,
    pub outcome: StatementOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub results: Vec<StatementResult>,
}

impl ExecutionReport {
    /// Rows of the last statement that returned any.
    pub fn last_rows(&self) -> Option<&[Record]> {
        self.results.iter().rev().find_map(|r| match &r.outcome {
            StatementOutcome::Rows(rows) => Some(rows.as_slice()),
            _ => None,
        })
    }
}

/// A script stopped at `statement`; `completed` holds what ran before it.
#[derive(Debug, Error)]
#[error("Statement {statement} failed: {error}")]
pub struct ExecutionFailure {
    pub statement: usize,
    pub completed: ExecutionReport,
    #[source]
    pub error: ExecutionError,
}

/// Runs bound scripts. Holds no per-run state, so one executor can serve
/// concurrent executions of the same script.
pub struct ScriptExecutor {
    backend: Arc<dyn QueryBackend>,
    transports: TransportRegistry,
    targets: IndexMap<String, String>,
}

impl ScriptExecutor {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            backend,
            transports: TransportRegistry::new(),
            targets: IndexMap::new(),
        }
    }

    /// The sqlx backend with queue, HTTP and file transports.
    pub fn with_defaults(http_timeout: Duration) -> Result<Self, ExecutionError> {
        let transports = TransportRegistry::new()
            .with("queue", Arc::new(MemoryQueue::new()))
            .with("http", Arc::new(HttpTransport::new(http_timeout)?))
            .with("https", Arc::new(HttpTransport::new(http_timeout)?))
            .with("file", Arc::new(FileTransport::new()));
        Ok(Self::new(Arc::new(SqlxBackend::new())).with_transports(transports))
    }

    pub fn with_transports(mut self, transports: TransportRegistry) -> Self {
        self.transports = transports;
        self
    }

    /// Targets `USE name` can refer to.
    pub fn with_named_targets(mut self, targets: impl IntoIterator<Item = (String, String)>) -> Self {
        self.targets = targets
            .into_iter()
            .map(|(name, uri)| (name.to_lowercase(), uri))
            .collect();
        self
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    pub async fn execute(
        &self,
        script: &BoundScript,
        context: &mut ExecutionContext,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let mut report = ExecutionReport::default();
        let token = context.cancellation_token();

        for (index, statement) in script.statements().iter().enumerate() {
            let verb = statement.verb();
            let outcome = if token.is_cancelled() {
                Err(ExecutionError::Cancelled)
            } else {
                debug!(index, verb, "dispatching statement");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ExecutionError::Cancelled),
                    outcome = self.dispatch(statement, context) => outcome,
                }
            };

            match outcome {
                Ok(outcome) => report.results.push(StatementResult { index, verb, outcome }),
                Err(error) => {
                    warn!(index, verb, %error, "statement failed");
                    return Err(ExecutionFailure {
                        statement: index,
                        completed: report,
                        error,
                    });
                }
            }
        }

        info!(statements = report.results.len(), "script finished");
        Ok(report)
    }

    async fn dispatch(
        &self,
        statement: &Statement,
        context: &mut ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        match statement {
            Statement::Comment(_) => Ok(StatementOutcome::Skipped),
            Statement::Use(stmt) => self.use_target(stmt, context).await,
            Statement::Select(_) | Statement::Delete(_) => self.relational(statement, context).await,
            Statement::Consume(stmt) => self.consume(statement, stmt, context).await,
            Statement::Produce(stmt) => self.produce(statement, stmt, context).await,
            Statement::Request(stmt) => self.request(stmt, context).await,
            Statement::Import(stmt) => self.import(stmt, context).await,
        }
    }

    async fn use_target(
        &self,
        stmt: &UseStatement,
        context: &mut ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let uri = match &stmt.target {
            UseTarget::Uri(template) => context::expand_template(template, context)?,
            UseTarget::Named(name) => self
                .targets
                .get(&name.to_lowercase())
                .cloned()
                .ok_or_else(|| ExecutionError::UnknownTarget(name.clone()))?,
        };
        let target = Target::parse(&uri)?;
        match &target {
            Target::Database { uri, .. } => self.backend.open(uri).await?,
            Target::Transport { uri } => {
                self.transports.get(uri.scheme())?;
            }
        }
        let described = target.to_string();
        info!(target = %described, "switched target");
        context.set_target(target);
        Ok(StatementOutcome::TargetChanged(described))
    }

    async fn relational(
        &self,
        statement: &Statement,
        context: &ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let (uri, dialect) = database(context)?;
        let command = command_for(statement, dialect)?;
        let params = param_values(&command, context)?;
        match statement {
            Statement::Delete(delete) if delete.output.is_empty() => {
                let affected = self.backend.execute(&uri, &command.text, &params).await?;
                Ok(StatementOutcome::Affected(affected))
            }
            _ => Ok(StatementOutcome::Rows(
                self.backend.fetch(&uri, &command.text, &params).await?,
            )),
        }
    }

    async fn consume(
        &self,
        statement: &Statement,
        stmt: &ConsumeStatement,
        context: &ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let uri = match context.target() {
            Some(Target::Transport { uri }) => uri.clone(),
            _ => return self.relational(statement, context).await,
        };
        let transport = self.transports.get(uri.scheme())?;
        let source = stmt
            .source
            .table_name()
            .map(|t| t.name().to_string())
            .unwrap_or_default();
        let variables = context.variables();
        let filter = |row: &Record| match &stmt.selection {
            Some(predicate) => Evaluator::new(variables).with_row(row).matches(predicate),
            None => Ok(true),
        };

        let messages = transport
            .consume(
                &uri,
                ConsumeRequest {
                    source: &source,
                    limit: stmt.top,
                    filter: &filter,
                },
            )
            .await?;

        // ORDER BY may name source columns or projection aliases
        let mut pairs = Vec::with_capacity(messages.len());
        for message in messages {
            let projected = Evaluator::new(variables).with_row(&message).project(&stmt.projection)?;
            let mut visible = message;
            visible.extend(projected.iter().map(|(k, v)| (k.clone(), v.clone())));
            pairs.push((visible, projected));
        }
        let sorted = eval::sort_by_order(pairs, &stmt.order_by, variables, |(visible, _)| visible)?;
        Ok(StatementOutcome::Rows(sorted.into_iter().map(|(_, row)| row).collect()))
    }

    async fn produce(
        &self,
        statement: &Statement,
        stmt: &ProduceStatement,
        context: &ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let uri = transport_uri(&stmt.target, context)?;
        let transport = self.transports.get(uri.scheme())?;
        let eval = Evaluator::new(context.variables());
        let options = eval.options(&stmt.options)?;

        let records = if stmt.from.is_some() {
            let (db, dialect) = database(context)?;
            let command = command_for(statement, dialect)?;
            let params = param_values(&command, context)?;
            self.backend.fetch(&db, &command.text, &params).await?
        } else {
            let keep = match &stmt.selection {
                Some(predicate) => eval.matches(predicate)?,
                None => true,
            };
            if keep { vec![eval.project(&stmt.payload)?] } else { Vec::new() }
        };

        let produced = transport.produce(&uri, records, &options).await?;
        debug!(scheme = uri.scheme(), produced, "produce finished");
        Ok(StatementOutcome::Produced(produced))
    }

    async fn request(
        &self,
        stmt: &RequestStatement,
        context: &mut ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let uri = transport_uri(&stmt.target, context)?;
        let transport = self.transports.get(uri.scheme())?;
        let (headers, body) = {
            let eval = Evaluator::new(context.variables());
            (eval.options(&stmt.headers)?, eval.project(&stmt.options)?)
        };

        let response = transport.request(&uri, &headers, &body).await?;
        let rows = match &response {
            VarValue::Rows(rows) => rows.len(),
            VarValue::Scalar(_) => 1,
        };
        context.set_variable(&stmt.into.name, response);
        Ok(StatementOutcome::Bound {
            variables: vec![stmt.into.name.clone()],
            rows,
        })
    }

    async fn import(
        &self,
        stmt: &ImportStatement,
        context: &mut ExecutionContext,
    ) -> Result<StatementOutcome, ExecutionError> {
        let uri = transport_uri(&stmt.source, context)?;
        let transport = self.transports.get(uri.scheme())?;
        let options = Evaluator::new(context.variables()).options(&stmt.options)?;
        let records = transport.import(&uri, &options).await?;
        let rows = records.len();

        match stmt.targets.as_slice() {
            [single] => context.set_variable(&single.name, VarValue::Rows(records)),
            targets => {
                // Several targets take the columns of the first record in order
                let first = records.into_iter().next().ok_or_else(|| {
                    ExecutionError::Evaluation(format!("IMPORT from {} returned no record to split", uri))
                })?;
                if first.len() < targets.len() {
                    return Err(ExecutionError::Evaluation(format!(
                        "IMPORT into {} variables but the record has {} columns",
                        targets.len(),
                        first.len()
                    )));
                }
                for (target, value) in targets.iter().zip(first.into_values()) {
                    context.set_variable(&target.name, VarValue::Scalar(value));
                }
            }
        }

        Ok(StatementOutcome::Bound {
            variables: stmt.targets.iter().map(|t| t.name.clone()).collect(),
            rows,
        })
    }
}

fn database(context: &ExecutionContext) -> Result<(String, Dialect), ExecutionError> {
    match context.target() {
        Some(Target::Database { uri, dialect }) => Ok((uri.clone(), *dialect)),
        Some(other) => Err(ExecutionError::NoDatabaseTarget(other.to_string())),
        None => Err(ExecutionError::NoDatabaseTarget("none".to_string())),
    }
}

fn command_for(statement: &Statement, dialect: Dialect) -> Result<Command, ExecutionError> {
    generate_statement(statement, dialect)?.ok_or_else(|| {
        ExecutionError::Evaluation(format!("{} has no database form", statement.verb()))
    })
}

/// Parameter values in placeholder order, variables read from the context.
fn param_values(command: &Command, context: &ExecutionContext) -> Result<Vec<Value>, ExecutionError> {
    command
        .params
        .iter()
        .map(|param| match &param.value {
            ParamValue::Literal(value) => Ok(value.clone()),
            ParamValue::Variable(name) => context.scalar(name),
        })
        .collect()
}

fn transport_uri(template: &str, context: &ExecutionContext) -> Result<Url, ExecutionError> {
    let text = context::expand_template(template, context)?;
    Url::parse(&text).map_err(|e| ExecutionError::UnknownTarget(format!("{} ({})", text, e)))
}
