//! weave.toml configuration
//!
//! ```toml
//! dialect = "postgres"
//! target = "postgres://localhost/app"
//! catalog = "catalog.toml"
//! http_timeout_secs = 10
//! log_filter = "sqlweave=debug"
//!
//! [targets]
//! reporting = "mysql://report@db2/reporting"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binder::{MemoryCatalog, TableMeta};
use crate::error::{WeaveError, WeaveResult};
use crate::transpiler::Dialect;

pub const CONFIG_FILE: &str = "weave.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    /// Dialect for `compile` when no target decides it.
    pub dialect: Dialect,

    /// Active target before the first USE.
    pub target: Option<String>,

    /// Targets scripts can select with `USE name`.
    pub targets: IndexMap<String, String>,

    /// Path to a catalog TOML file.
    pub catalog: Option<PathBuf>,

    /// Tables declared inline, added to the catalog file's.
    pub tables: Vec<TableMeta>,

    pub http_timeout_secs: u64,

    /// tracing-subscriber filter, used when RUST_LOG is unset.
    pub log_filter: Option<String>,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            target: None,
            targets: IndexMap::new(),
            catalog: None,
            tables: Vec::new(),
            http_timeout_secs: 30,
            log_filter: None,
        }
    }
}

impl WeaveConfig {
    pub fn from_toml_str(text: &str) -> WeaveResult<Self> {
        toml::from_str(text).map_err(|e| WeaveError::config(format!("invalid {}: {}", CONFIG_FILE, e)))
    }

    pub fn load_from(path: impl AsRef<Path>) -> WeaveResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WeaveError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&text)?;
        // Catalog paths are relative to the config file
        if let Some(catalog) = &config.catalog
            && catalog.is_relative()
            && let Some(dir) = path.parent()
        {
            config.catalog = Some(dir.join(catalog));
        }
        Ok(config)
    }

    /// Where a config file is looked for, in order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("weave").join(CONFIG_FILE));
        }
        paths
    }

    /// An explicit path must exist; otherwise the first file found on the
    /// search path wins, and with none the defaults apply.
    pub fn load(explicit: Option<&Path>) -> WeaveResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load_from(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn load_catalog(&self) -> WeaveResult<MemoryCatalog> {
        let mut catalog = match &self.catalog {
            Some(path) => MemoryCatalog::load(path)?,
            None => MemoryCatalog::new(),
        };
        for table in &self.tables {
            catalog.insert(table.clone());
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::binder::Catalog;

    #[test]
    fn test_defaults_when_empty() {
        let config = WeaveConfig::from_toml_str("").unwrap();
        assert_eq!(config, WeaveConfig::default());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_full_config() {
        let config = WeaveConfig::from_toml_str(
            r#"
            dialect = "mssql"
            target = "mssql://sa@db/app"
            http_timeout_secs = 5

            [targets]
            Reporting = "mysql://db2/reporting"

            [[tables]]
            name = "users"
            columns = [{ name = "id", type = "int" }]
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::SqlServer);
        assert_eq!(config.targets["Reporting"], "mysql://db2/reporting");
        let catalog = config.load_catalog().unwrap();
        assert!(catalog.table("USERS").is_some());
    }

    #[test]
    fn test_unknown_dialect_is_a_config_error() {
        let err = WeaveConfig::from_toml_str("dialect = \"oracle\"").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: invalid weave.toml"));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        assert!(WeaveConfig::load(Some(Path::new("/nonexistent/weave.toml"))).is_err());
    }
}
