//! Per-execution state: variables, active target and cancellation.

use std::fmt;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::ast::Value;
use crate::engine::Record;
use crate::error::ExecutionError;
use crate::transpiler::Dialect;

/// What a script variable holds.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    Scalar(Value),
    Rows(Vec<Record>),
}

impl VarValue {
    /// Value for a placeholder or expression; row sets have none.
    pub fn as_scalar(&self, name: &str) -> Result<&Value, ExecutionError> {
        match self {
            VarValue::Scalar(value) => Ok(value),
            VarValue::Rows(_) => Err(ExecutionError::NotScalar(name.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            VarValue::Scalar(value) => value.to_json(),
            VarValue::Rows(rows) => serde_json::Value::Array(
                rows.iter()
                    .map(|row| {
                        serde_json::Value::Object(
                            row.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

impl From<Value> for VarValue {
    fn from(value: Value) -> Self {
        VarValue::Scalar(value)
    }
}

/// The endpoint statements run against, chosen by USE.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Database { uri: String, dialect: Dialect },
    Transport { uri: Url },
}

impl Target {
    /// The URL scheme decides: database schemes pick a dialect, anything
    /// else is a transport.
    pub fn parse(uri: &str) -> Result<Self, ExecutionError> {
        let url = Url::parse(uri).map_err(|e| ExecutionError::UnknownTarget(format!("{} ({})", uri, e)))?;
        match Dialect::from_scheme(url.scheme()) {
            Some(dialect) => Ok(Target::Database {
                uri: uri.to_string(),
                dialect,
            }),
            None => Ok(Target::Transport { uri: url }),
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Target::Database { uri, .. } => uri,
            Target::Transport { uri } => uri.as_str(),
        }
    }

    pub fn dialect(&self) -> Option<Dialect> {
        match self {
            Target::Database { dialect, .. } => Some(*dialect),
            Target::Transport { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Database { dialect, .. } => write!(f, "{} database", dialect),
            Target::Transport { uri } => write!(f, "{} transport", uri.scheme()),
        }
    }
}

/// State of one script run. Variables are flat and live for the whole
/// script; nothing here is shared with other executions.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    variables: IndexMap<String, VarValue>,
    target: Option<Target>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an active target, as if the script began with USE.
    pub fn with_target(mut self, uri: &str) -> Result<Self, ExecutionError> {
        self.target = Some(Target::parse(uri)?);
        Ok(self)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn set_variable(&mut self, name: &str, value: VarValue) {
        self.variables.insert(normalize(name), value);
    }

    pub fn variable(&self, name: &str) -> Option<&VarValue> {
        self.variables.get(&normalize(name))
    }

    /// Scalar value of a variable, for placeholders and expressions.
    pub fn scalar(&self, name: &str) -> Result<Value, ExecutionError> {
        self.variable(name)
            .ok_or_else(|| ExecutionError::UnboundVariable(name.to_string()))?
            .as_scalar(name)
            .cloned()
    }

    pub fn variables(&self) -> &IndexMap<String, VarValue> {
        &self.variables
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = Some(target);
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches('@').to_lowercase()
}

/// Expand `{name}` placeholders in a target template from scalar variables.
pub fn expand_template(template: &str, context: &ExecutionContext) -> Result<String, ExecutionError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let name = &after[..close];
        match context.scalar(name)? {
            Value::String(s) => out.push_str(&s),
            other => out.push_str(&other.to_json().to_string()),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
