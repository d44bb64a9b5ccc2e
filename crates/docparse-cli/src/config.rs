//! Configuration file handling for docparse
//!
//! ```toml
//! base_url = "https://api.cloud.llamaindex.ai/api/parsing"
//! output = "text"
//! no_color = false
//!
//! [options]
//! result_type = "markdown"
//! language = "de"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::output::OutputFormat;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default service endpoint
    pub base_url: Option<String>,
    /// Default output format
    pub output: Option<OutputFormat>,
    /// Disable colored output
    pub no_color: Option<bool>,
    /// Parse option defaults
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Config {
    /// Load the default config file, falling back to defaults with a
    /// warning when it cannot be read or parsed
    pub fn load_or_default() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_or_default_from(&path),
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Ignoring config file");
                Self::default()
            }
        }
    }

    fn load_or_default_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Ignoring config file");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("docparse");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(
        &self,
        base_url: Option<&str>,
        output: Option<OutputFormat>,
        no_color: bool,
    ) -> MergedConfig {
        MergedConfig {
            base_url: base_url.map(String::from).or_else(|| self.base_url.clone()),
            output: output.or(self.output).unwrap_or_default(),
            no_color: no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Fully resolved configuration after merging CLI args
///
/// A `None` base URL defers to the environment and then the built-in
/// default.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub base_url: Option<String>,
    pub output: OutputFormat,
    pub no_color: bool,
}

/// Parse a `key=value` pass-through option
///
/// The value is read as JSON when it parses (`true`, `3`, `"x"`), and as
/// a plain string otherwise.
pub fn parse_key_value(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("expected key=value, got '{}'", raw))?;

    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("empty option name in '{}'", raw);
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
