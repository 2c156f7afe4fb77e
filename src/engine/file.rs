//! Local file transport: JSON and JSON-lines.
//!
//! The format comes from the `format` option (`json` or `jsonl`), else from
//! the file extension (`.jsonl` and `.ndjson` are line-delimited).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::ast::Value;
use crate::engine::Record;
use crate::engine::transport::{Transport, record_from_json, record_to_json, records_from_json};
use crate::error::ExecutionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Lines,
}

#[derive(Debug, Default, Clone)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }
}

fn path_of(uri: &Url) -> Result<PathBuf, ExecutionError> {
    uri.to_file_path()
        .map_err(|_| ExecutionError::transport(uri.as_str(), "not a local file path"))
}

fn format_of(uri: &Url, path: &Path, options: &Record) -> Result<Format, ExecutionError> {
    match options.get("format") {
        Some(Value::String(f)) => match f.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "jsonl" | "ndjson" | "lines" => Ok(Format::Lines),
            other => Err(ExecutionError::transport(uri.as_str(), format!("unknown format '{}'", other))),
        },
        Some(other) => Err(ExecutionError::transport(uri.as_str(), format!("format must be text, got {}", other))),
        None => match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => Ok(Format::Lines),
            _ => Ok(Format::Json),
        },
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn import(&self, uri: &Url, options: &Record) -> Result<Vec<Record>, ExecutionError> {
        let path = path_of(uri)?;
        let format = format_of(uri, &path, options)?;
        let text = tokio::fs::read_to_string(&path).await?;
        let records = match format {
            Format::Json => records_from_json(uri.as_str(), serde_json::from_str(&text)?)?,
            Format::Lines => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| record_from_json(uri.as_str(), serde_json::from_str(line)?))
                .collect::<Result<Vec<_>, _>>()?,
        };
        debug!(path = %path.display(), rows = records.len(), "imported file");
        Ok(records)
    }

    /// Appends one JSON line per record.
    async fn produce(&self, uri: &Url, records: Vec<Record>, _options: &Record) -> Result<usize, ExecutionError> {
        let path = path_of(uri)?;
        let mut buffer = String::new();
        for record in &records {
            buffer.push_str(&serde_json::to_string(&record_to_json(record))?);
            buffer.push('\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn temp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sqlweave-{}-{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_import_json_array() {
        let path = temp("users.json");
        std::fs::write(&path, r#"[{"id": 1, "email": "a@x"}, {"id": 2, "email": null}]"#).unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        let rows = FileTransport.import(&uri, &Record::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["email"], Value::from("a@x"));
        assert_eq!(rows[1]["email"], Value::Null);
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_produce_then_import_lines() {
        let path = temp("out.jsonl");
        std::fs::remove_file(&path).ok();
        let uri = Url::from_file_path(&path).unwrap();
        let mut record = Record::new();
        record.insert("n".to_string(), Value::Int(7));
        FileTransport.produce(&uri, vec![record.clone(), record], &Record::new()).await.unwrap();
        let rows = FileTransport.import(&uri, &Record::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["n"], Value::Int(7));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_explicit_format_option() {
        let path = temp("data.txt");
        std::fs::write(&path, "{\"a\": 1}\n\n{\"a\": 2}\n").unwrap();
        let uri = Url::from_file_path(&path).unwrap();
        let mut options = Record::new();
        options.insert("format".to_string(), Value::from("jsonl"));
        assert_eq!(FileTransport.import(&uri, &options).await.unwrap().len(), 2);
        options.insert("format".to_string(), Value::from("xml"));
        assert!(FileTransport.import(&uri, &options).await.is_err());
        std::fs::remove_file(path).ok();
    }
}
