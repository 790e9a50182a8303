//! Inspector configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! dialect: sqlite
//! default_schema: main
//! include_system_objects: false
//! exclude:
//!   - audit_log
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use db_schema_core::Dialect;
use db_schema_sqlite::CatalogOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading or writing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings shared by every subcommand. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    pub version: String,
    /// Dialect whose identifier rules `resolve` uses.
    pub dialect: Dialect,
    /// Schema used for unqualified names; the dialect's default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,
    /// Report `sqlite_*` internal tables too.
    pub include_system_objects: bool,
    /// Object names never read from a catalog.
    pub exclude: Vec<String>,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            dialect: Dialect::Sqlite,
            default_schema: None,
            include_system_objects: false,
            exclude: Vec::new(),
        }
    }
}

impl InspectConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be read, or
    /// [`ConfigError::YamlError`] if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::IoError`] if the file cannot be written, or
    /// [`ConfigError::YamlError`] if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_yaml::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Schema for unqualified names under `dialect`.
    pub fn schema_for(&self, dialect: Dialect) -> Option<String> {
        self.default_schema
            .clone()
            .or_else(|| dialect.default_schema().map(str::to_string))
    }

    /// Catalog reader options for a SQLite database.
    pub fn catalog_options(&self) -> CatalogOptions {
        let mut options = CatalogOptions::default()
            .include_system_objects(self.include_system_objects)
            .with_exclude(self.exclude.iter().cloned());
        if let Some(schema) = &self.default_schema {
            options = options.with_schema(schema.clone());
        }
        options
    }
}
