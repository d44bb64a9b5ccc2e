//! Client configuration: credential, endpoint, and parse options
//!
//! Options are resolved once, when the client is built, by overlaying
//! caller-supplied overrides on the defaults. The resulting
//! [`ClientConfig`] is immutable and shared by every request the client
//! makes.
//!
//! Option files can be YAML, JSON, or TOML:
//!
//! ```yaml
//! result_type: markdown
//! language: fr
//! check_interval_ms: 2000
//! premium_mode: true
//! target_pages: "0,2-4"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ParseError, Result};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "LLAMA_CLOUD_API_KEY";

/// Environment variable overriding the service endpoint
pub const BASE_URL_ENV: &str = "LLAMA_CLOUD_BASE_URL";

/// Default service endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.cloud.llamaindex.ai/api/parsing";

/// Form field marking uploads made by this library
pub const PROVENANCE_FIELD: &str = "from_rust_package";

/// Options that only steer the client and are never sent upstream
const LOCAL_FIELDS: &[&str] = &[
    "result_type",
    "num_workers",
    "check_interval",
    "check_interval_ms",
    "max_timeout",
    "max_timeout_ms",
    "verbose",
    "show_progress",
    "ignore_errors",
];

/// Second-valued aliases for the millisecond interval fields
const SECONDS_ALIASES: &[(&str, &str)] = &[
    ("check_interval", "check_interval_ms"),
    ("max_timeout", "max_timeout_ms"),
];

/// Text-valued options; numbers and booleans given for these are taken
/// as their literal text (`target_pages=3` means the page "3")
const TEXT_FIELDS: &[&str] = &[
    "language",
    "parsing_instruction",
    "page_separator",
    "page_prefix",
    "page_suffix",
    "gpt4o_api_key",
    "bounding_box",
    "target_pages",
    "vendor_multimodal_api_key",
    "vendor_multimodal_model_name",
    "webhook_url",
    "azure_openai_deployment_name",
    "azure_openai_endpoint",
    "azure_openai_api_version",
    "azure_openai_key",
    "http_proxy",
];

// =============================================================================
// Credential
// =============================================================================

/// API key sent as a bearer credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.0.chars().take(4).collect();
        write!(f, "ApiKey({}…)", visible)
    }
}

// =============================================================================
// Parse options
// =============================================================================

/// Representation requested from the result endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    #[default]
    Text,
    Markdown,
    Json,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => Err(ParseError::Configuration(format!(
                "unknown result type '{}' (expected text, markdown, or json)",
                other
            ))),
        }
    }
}

/// Options for a parse job
///
/// Everything except the local fields (`result_type`, `num_workers`,
/// `check_interval_ms`, `max_timeout_ms`, `verbose`, `show_progress`,
/// `ignore_errors`) is forwarded verbatim to the service. Keys this struct
/// does not know about land in `extra` and are forwarded too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    // Local behavior
    pub result_type: ResultType,
    pub num_workers: usize,
    pub check_interval_ms: u64,
    pub max_timeout_ms: u64,
    pub verbose: bool,
    pub show_progress: bool,
    pub ignore_errors: bool,

    // Forwarded to the service
    pub language: String,
    pub parsing_instruction: String,
    pub skip_diagonal_text: bool,
    pub invalidate_cache: bool,
    pub do_not_cache: bool,
    pub fast_mode: bool,
    pub premium_mode: bool,
    pub continuous_mode: bool,
    pub do_not_unroll_columns: bool,
    pub page_separator: Option<String>,
    pub page_prefix: Option<String>,
    pub page_suffix: Option<String>,
    pub gpt4o_mode: bool,
    pub gpt4o_api_key: Option<String>,
    pub guess_xlsx_sheet_names: bool,
    pub bounding_box: Option<String>,
    pub target_pages: Option<String>,
    pub split_by_page: bool,
    pub vendor_multimodal_api_key: Option<String>,
    pub use_vendor_multimodal_model: bool,
    pub vendor_multimodal_model_name: Option<String>,
    pub take_screenshot: bool,
    pub disable_ocr: bool,
    pub is_formatting_instruction: bool,
    pub annotate_links: bool,
    pub webhook_url: Option<String>,
    pub azure_openai_deployment_name: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_version: Option<String>,
    pub azure_openai_key: Option<String>,
    pub http_proxy: Option<String>,

    /// Options unknown to this client, forwarded unchanged
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            result_type: ResultType::Text,
            num_workers: 4,
            check_interval_ms: 1_000,
            max_timeout_ms: 2_000_000,
            verbose: true,
            show_progress: true,
            ignore_errors: true,

            language: "en".to_string(),
            parsing_instruction: String::new(),
            skip_diagonal_text: false,
            invalidate_cache: false,
            do_not_cache: false,
            fast_mode: false,
            premium_mode: false,
            continuous_mode: false,
            do_not_unroll_columns: false,
            page_separator: None,
            page_prefix: None,
            page_suffix: None,
            gpt4o_mode: false,
            gpt4o_api_key: None,
            guess_xlsx_sheet_names: false,
            bounding_box: None,
            target_pages: None,
            split_by_page: true,
            vendor_multimodal_api_key: None,
            use_vendor_multimodal_model: false,
            vendor_multimodal_model_name: None,
            take_screenshot: false,
            disable_ocr: false,
            is_formatting_instruction: false,
            annotate_links: false,
            webhook_url: None,
            azure_openai_deployment_name: None,
            azure_openai_endpoint: None,
            azure_openai_api_version: None,
            azure_openai_key: None,
            http_proxy: None,

            extra: BTreeMap::new(),
        }
    }
}

impl ParseOptions {
    /// Overlay `overrides` on the defaults
    ///
    /// Explicit values win on collision, unknown keys pass through into
    /// `extra`, and `null` leaves the default in place.
    pub fn merged(overrides: &Map<String, Value>) -> Result<Self> {
        Self::default().overlay(overrides)
    }

    /// Overlay `overrides` on this option set, producing a new one
    pub fn overlay(&self, overrides: &Map<String, Value>) -> Result<Self> {
        let mut base = match serde_json::to_value(self)
            .map_err(|e| ParseError::Configuration(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        for (key, value) in normalize_overrides(overrides)? {
            if !value.is_null() {
                base.insert(key, value);
            }
        }

        serde_json::from_value(Value::Object(base))
            .map_err(|e| ParseError::Configuration(format!("invalid option: {}", e)))
    }

    /// Create a builder over the defaults
    pub fn builder() -> ParseOptionsBuilder {
        ParseOptionsBuilder::default()
    }

    /// Load options from a YAML, JSON, or TOML file (chosen by extension)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ParseError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Parse options from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let map = serde_yaml::from_str::<Option<Map<String, Value>>>(yaml)
            .map_err(|e| ParseError::Configuration(e.to_string()))?;
        Self::merged(&map.unwrap_or_default())
    }

    /// Parse options from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let map = serde_json::from_str::<Map<String, Value>>(json)
            .map_err(|e| ParseError::Configuration(e.to_string()))?;
        Self::merged(&map)
    }

    /// Parse options from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let map = toml::from_str::<Map<String, Value>>(content)
            .map_err(|e| ParseError::Configuration(e.to_string()))?;
        Self::merged(&map)
    }

    /// Serialize options to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ParseError::Configuration(e.to_string()))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// Upload form fields: every non-null forwarded option plus the
    /// provenance marker. Booleans and numbers are rendered as text.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let mut fields: Vec<(String, String)> = map
            .into_iter()
            .filter(|(key, _)| !LOCAL_FIELDS.contains(&key.as_str()))
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect();

        fields.push((PROVENANCE_FIELD.to_string(), "true".to_string()));
        fields
    }
}

/// Rewrite caller overrides into field-shaped values
///
/// `check_interval` / `max_timeout` (seconds) become their `_ms` fields
/// unless the `_ms` field is also given. Scalars given for text fields
/// become strings.
fn normalize_overrides(overrides: &Map<String, Value>) -> Result<Map<String, Value>> {
    let mut normalized = Map::new();

    for (key, value) in overrides {
        let alias = SECONDS_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key.as_str());
        if let Some((_, ms_key)) = alias {
            if value.is_null() || overrides.contains_key(*ms_key) {
                continue;
            }
            let ms = value
                .as_f64()
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(|secs| (secs * 1000.0).round() as u64)
                .ok_or_else(|| {
                    ParseError::Configuration(format!(
                        "invalid option: {} must be a non-negative number of seconds, got {}",
                        key, value
                    ))
                })?;
            normalized.insert((*ms_key).to_string(), Value::from(ms));
            continue;
        }

        let value = match value {
            Value::Number(_) | Value::Bool(_) if TEXT_FIELDS.contains(&key.as_str()) => {
                Value::String(value.to_string())
            }
            other => other.clone(),
        };
        normalized.insert(key.clone(), value);
    }

    Ok(normalized)
}

/// Builder for [`ParseOptions`]
///
/// Collects overrides and applies them with [`ParseOptions::merged`], so
/// typed setters and [`ParseOptionsBuilder::set`] share one code path.
#[derive(Debug, Clone, Default)]
pub struct ParseOptionsBuilder {
    overrides: Map<String, Value>,
}

impl ParseOptionsBuilder {
    /// Set any option by its wire name
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn result_type(self, result_type: ResultType) -> Self {
        self.set("result_type", result_type.as_str())
    }

    pub fn num_workers(self, workers: usize) -> Self {
        self.set("num_workers", workers)
    }

    /// Set the status poll interval in milliseconds
    pub fn check_interval_ms(self, ms: u64) -> Self {
        self.set("check_interval_ms", ms)
    }

    /// Set the job timeout budget in milliseconds
    pub fn max_timeout_ms(self, ms: u64) -> Self {
        self.set("max_timeout_ms", ms)
    }

    pub fn verbose(self, verbose: bool) -> Self {
        self.set("verbose", verbose)
    }

    pub fn show_progress(self, show: bool) -> Self {
        self.set("show_progress", show)
    }

    pub fn ignore_errors(self, ignore: bool) -> Self {
        self.set("ignore_errors", ignore)
    }

    pub fn language(self, language: impl Into<String>) -> Self {
        self.set("language", language.into())
    }

    pub fn parsing_instruction(self, instruction: impl Into<String>) -> Self {
        self.set("parsing_instruction", instruction.into())
    }

    pub fn target_pages(self, pages: impl Into<String>) -> Self {
        self.set("target_pages", pages.into())
    }

    pub fn premium_mode(self, enabled: bool) -> Self {
        self.set("premium_mode", enabled)
    }

    pub fn fast_mode(self, enabled: bool) -> Self {
        self.set("fast_mode", enabled)
    }

    pub fn page_separator(self, separator: impl Into<String>) -> Self {
        self.set("page_separator", separator.into())
    }

    pub fn webhook_url(self, url: impl Into<String>) -> Self {
        self.set("webhook_url", url.into())
    }

    /// Build the options
    pub fn build(self) -> Result<ParseOptions> {
        ParseOptions::merged(&self.overrides)
    }
}

// =============================================================================
// Client configuration
// =============================================================================

/// HTTP timeout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// General request timeout in milliseconds (default: 60s)
    #[serde(default = "default_request_timeout")]
    pub request_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Timeout for URL submissions in milliseconds (default: 30s)
    #[serde(default = "default_url_upload_timeout")]
    pub url_upload_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            request_ms: default_request_timeout(),
            connect_ms: default_connect_timeout(),
            url_upload_ms: default_url_upload_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60_000 // 60 seconds
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_url_upload_timeout() -> u64 {
    30_000 // 30 seconds
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub options: ParseOptions,
    pub timeouts: TimeoutsConfig,
}

impl ClientConfig {
    /// Resolve configuration from explicit values and the process environment
    pub fn resolve(
        api_key: Option<String>,
        base_url: Option<String>,
        overrides: &Map<String, Value>,
    ) -> Result<Self> {
        Self::resolve_with(api_key, base_url, overrides, |name| std::env::var(name).ok())
    }

    /// Resolve configuration with a custom environment lookup
    ///
    /// Explicit arguments win over the environment; empty values count as
    /// absent. Fails with [`ParseError::Configuration`] when no API key is
    /// available.
    pub fn resolve_with<F>(
        api_key: Option<String>,
        base_url: Option<String>,
        overrides: &Map<String, Value>,
        env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: String| if v.trim().is_empty() { None } else { Some(v) };

        let api_key = api_key
            .and_then(non_empty)
            .or_else(|| env(API_KEY_ENV).and_then(non_empty))
            .ok_or_else(|| {
                ParseError::Configuration(format!(
                    "API key is required (pass one explicitly or set {})",
                    API_KEY_ENV
                ))
            })?;

        let base_url = base_url
            .and_then(non_empty)
            .or_else(|| env(BASE_URL_ENV).and_then(non_empty))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key: ApiKey::new(api_key),
            base_url,
            options: ParseOptions::merged(overrides)?,
            timeouts: TimeoutsConfig::default(),
        })
    }

    /// Create a builder for programmatic configuration
    pub fn builder(api_key: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(api_key)
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given API key and default endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                api_key: ApiKey::new(api_key),
                base_url: DEFAULT_BASE_URL.to_string(),
                options: ParseOptions::default(),
                timeouts: TimeoutsConfig::default(),
            },
        }
    }

    /// Set the service base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the parse options
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Set request timeout in milliseconds
    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.request_ms = ms;
        self
    }

    /// Set connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.connect_ms = ms;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
