use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Formats accepted for `TIMESTAMP '...'` literals, tried in order.
pub const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A scalar value: literal in a script, parameter in a command, or cell in
/// a record moving between collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(NaiveDateTime),
    /// Nested payloads coming back from transports.
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Unknown,
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::String(_) => DataType::Text,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Json(_) => DataType::Json,
        }
    }

    /// Parse the body of a `TIMESTAMP '...'` literal. A bare date means
    /// midnight.
    pub fn parse_timestamp(text: &str) -> Option<Value> {
        for format in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Value::Timestamp(ts));
            }
        }
        chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
    }

    /// Convert into a JSON value for transports and output.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => {
                serde_json::Value::String(ts.format(TIMESTAMP_FORMATS[0]).to_string())
            }
            Value::Json(v) => v.clone(),
        }
    }

    /// Convert a JSON value, keeping scalars as scalars.
    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}

/// Renders the value as literal script text.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                // Keep the decimal point so the literal lexes as a float again
                let s = n.to_string();
                if s.contains(['.', 'e', 'E']) || !n.is_finite() {
                    write!(f, "{}", s)
                } else {
                    write!(f, "{}.0", s)
                }
            }
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Timestamp(ts) => write!(f, "TIMESTAMP '{}'", ts.format(TIMESTAMP_FORMATS[0])),
            Value::Json(v) => write!(f, "'{}'", v.to_string().replace('\'', "''")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Column and expression types known to the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "integer", alias = "bigint", alias = "smallint")]
    Int,
    #[serde(alias = "double", alias = "real", alias = "decimal", alias = "numeric")]
    Float,
    #[serde(alias = "string", alias = "varchar", alias = "char")]
    Text,
    #[serde(alias = "boolean")]
    Bool,
    #[serde(alias = "datetime", alias = "timestamptz")]
    Timestamp,
    #[serde(alias = "jsonb")]
    Json,
    Unknown,
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Unknown
    }
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Float)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Text => "text",
            DataType::Bool => "bool",
            DataType::Timestamp => "timestamp",
            DataType::Json => "json",
            DataType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_display() {
        assert_eq!(Value::String("it's".into()).to_string(), "'it''s'");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "TRUE");
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = Value::parse_timestamp("2024-03-01 10:30:00").unwrap();
        assert_eq!(ts.to_string(), "TIMESTAMP '2024-03-01 10:30:00'");
        let date = Value::parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date.to_string(), "TIMESTAMP '2024-03-01 00:00:00'");
        assert!(Value::parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_json_conversion() {
        let v = Value::from_json(serde_json::json!(3));
        assert_eq!(v, Value::Int(3));
        let v = Value::from_json(serde_json::json!({"a": 1}));
        assert_eq!(v.data_type(), DataType::Json);
    }
}
