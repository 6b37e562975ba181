//! TOML configuration for building a [`QueryExecutor`](crate::db::QueryExecutor).
//!
//! ```toml
//! dialect = "postgres"
//! schema = "app"
//!
//! [camel_case]
//! underscore_before_digits = true
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::ast::{CamelCaseOptions, DialectKind};
use crate::error::{QueryError, Result};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub dialect: DialectKind,
    /// Installs `WithSchemaPlugin` when set.
    pub schema: Option<String>,
    /// Installs `CamelCasePlugin` when present.
    pub camel_case: Option<CamelCaseOptions>,
}

impl QueryConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("querycraft")
            .join("config.toml")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .map_err(QueryError::Config)?;
        Self::from_toml_str(&content)
    }

    /// Load from [`default_path`](Self::default_path), falling back to
    /// defaults when no file exists.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .context("Invalid query configuration")
            .map_err(QueryError::Config)
    }
}
