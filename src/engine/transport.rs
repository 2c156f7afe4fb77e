//! Transport collaborators: queues, HTTP endpoints, files.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use url::Url;

use crate::engine::Record;
use crate::engine::context::VarValue;
use crate::error::ExecutionError;

/// Row filter a transport applies to candidate messages.
pub type RecordFilter<'a> = dyn Fn(&Record) -> Result<bool, ExecutionError> + Send + Sync + 'a;

/// What CONSUME asks a transport for.
pub struct ConsumeRequest<'a> {
    /// Queue or source name from the FROM clause.
    pub source: &'a str,
    /// Maximum number of messages to take.
    pub limit: Option<u64>,
    /// Messages failing the filter stay where they are.
    pub filter: &'a RecordFilter<'a>,
}

/// A non-database endpoint. Every verb has a default that reports the
/// transport does not support it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Remove and return matching messages.
    async fn consume(&self, uri: &Url, request: ConsumeRequest<'_>) -> Result<Vec<Record>, ExecutionError> {
        let _ = request;
        Err(unsupported(uri, "CONSUME"))
    }

    /// Write records; returns how many were accepted.
    async fn produce(&self, uri: &Url, records: Vec<Record>, options: &Record) -> Result<usize, ExecutionError> {
        let _ = (records, options);
        Err(unsupported(uri, "PRODUCE"))
    }

    async fn request(&self, uri: &Url, headers: &Record, body: &Record) -> Result<VarValue, ExecutionError> {
        let _ = (headers, body);
        Err(unsupported(uri, "REQUEST"))
    }

    async fn import(&self, uri: &Url, options: &Record) -> Result<Vec<Record>, ExecutionError> {
        let _ = options;
        Err(unsupported(uri, "IMPORT"))
    }
}

fn unsupported(uri: &Url, verb: &str) -> ExecutionError {
    ExecutionError::transport(uri.as_str(), format!("{} is not supported by the {} transport", verb, uri.scheme()))
}

/// Transports by URL scheme.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: IndexMap<String, Arc<dyn Transport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: &str, transport: Arc<dyn Transport>) {
        self.transports.insert(scheme.to_lowercase(), transport);
    }

    pub fn with(mut self, scheme: &str, transport: Arc<dyn Transport>) -> Self {
        self.register(scheme, transport);
        self
    }

    pub fn get(&self, scheme: &str) -> Result<Arc<dyn Transport>, ExecutionError> {
        self.transports
            .get(&scheme.to_lowercase())
            .cloned()
            .ok_or_else(|| ExecutionError::UnsupportedScheme(scheme.to_string()))
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.transports.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.schemes()).finish()
    }
}

/// Records from a JSON document: an array of objects or one object.
pub fn records_from_json(uri: &str, value: serde_json::Value) -> Result<Vec<Record>, ExecutionError> {
    match value {
        serde_json::Value::Array(items) => items.into_iter().map(|item| record_from_json(uri, item)).collect(),
        other => Ok(vec![record_from_json(uri, other)?]),
    }
}

pub fn record_from_json(uri: &str, value: serde_json::Value) -> Result<Record, ExecutionError> {
    match value {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, crate::ast::Value::from_json(v)))
            .collect()),
        other => Err(ExecutionError::transport(uri, format!("expected a JSON object, got {}", other))),
    }
}

pub fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(record.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}
