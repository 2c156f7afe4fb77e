//! HTTP transport over reqwest.
//!
//! REQUEST sends a POST with the evaluated options as a JSON body (a GET when
//! there are none). PRODUCE posts each record; IMPORT reads a JSON document.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::ast::Value;
use crate::engine::Record;
use crate::engine::context::VarValue;
use crate::engine::transport::{Transport, record_to_json, records_from_json};
use crate::error::ExecutionError;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder, uri: &Url) -> Result<String, ExecutionError> {
        let response = request
            .send()
            .await
            .map_err(|e| ExecutionError::transport(uri.as_str(), e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExecutionError::transport(uri.as_str(), e.to_string()))?;
        if !status.is_success() {
            warn!(uri = %uri, %status, "request failed");
            return Err(ExecutionError::transport(uri.as_str(), format!("HTTP {}: {}", status, body)));
        }
        debug!(uri = %uri, %status, bytes = body.len(), "request finished");
        Ok(body)
    }
}

/// JSON arrays and objects become rows; anything else is a scalar.
fn response_value(uri: &Url, body: String) -> Result<VarValue, ExecutionError> {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
            match records_from_json(uri.as_str(), json.clone()) {
                Ok(rows) => Ok(VarValue::Rows(rows)),
                Err(_) => Ok(VarValue::Scalar(Value::Json(json))),
            }
        }
        Ok(scalar) => Ok(VarValue::Scalar(Value::from_json(scalar))),
        Err(_) => Ok(VarValue::Scalar(Value::String(body))),
    }
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, uri: &Url, headers: &Record, body: &Record) -> Result<VarValue, ExecutionError> {
        let mut request = if body.is_empty() {
            self.client.get(uri.clone())
        } else {
            self.client.post(uri.clone()).json(&record_to_json(body))
        };
        for (name, value) in headers {
            request = request.header(name.as_str(), header_text(value));
        }
        let text = self.send(request, uri).await?;
        response_value(uri, text)
    }

    async fn produce(&self, uri: &Url, records: Vec<Record>, options: &Record) -> Result<usize, ExecutionError> {
        let mut sent = 0;
        for record in &records {
            let mut request = self.client.post(uri.clone()).json(&record_to_json(record));
            for (name, value) in options {
                request = request.header(name.as_str(), header_text(value));
            }
            self.send(request, uri).await?;
            sent += 1;
        }
        Ok(sent)
    }

    async fn import(&self, uri: &Url, options: &Record) -> Result<Vec<Record>, ExecutionError> {
        let mut request = self.client.get(uri.clone());
        for (name, value) in options {
            request = request.header(name.as_str(), header_text(value));
        }
        let text = self.send(request, uri).await?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        records_from_json(uri.as_str(), json)
    }
}
