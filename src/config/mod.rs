//! Configuration module for s3upload
//!
//! Handles loading and validation of the uploader configuration. Files are
//! either INI (a `[config]` section) or YAML (a `config:` mapping), with
//! environment variable expansion applied before parsing.

use crate::s3::TransferConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::{ConfigFormat, ConfigLoader};

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    // Regex to capture ${VAR} or ${VAR:-default}
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

/// Deserialize a yes/no flag.
///
/// INI files carry every value as a string, and YAML 1.2 no longer treats
/// `yes`/`no` as booleans, so both real booleans and the usual spellings
/// are accepted.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    struct FlagVisitor;

    impl serde::de::Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean or one of yes/no/true/false/on/off/1/0")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "on" | "1" => Ok(true),
                "no" | "false" | "off" | "0" | "" => Ok(false),
                other => Err(E::custom(format!("invalid flag value '{}'", other))),
            }
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Failed to parse config: {0}")]
    SourceError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Log levels accepted in `log_level`, including the Python-style spellings
/// (`warning`, `critical`) older config files use.
const LOG_LEVELS: &[&str] = &[
    "trace", "debug", "info", "warn", "warning", "error", "critical",
];

/// Uploader configuration
///
/// A read-only snapshot loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the directory tree to upload
    pub source_path: PathBuf,

    /// Base-name glob selecting files that are uploaded last
    #[serde(default)]
    pub trigger: Option<String>,

    pub s3_bucket: String,

    #[serde(default)]
    pub s3_prefix: String,

    /// Maximum concurrent file uploads. Default: 10
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Files at or above this size use multipart upload. Default: 8 MiB
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    /// Maximum concurrent part uploads within one file. Default: 20
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Multipart part size. Default: 8 MiB
    #[serde(default = "default_multipart_chunksize")]
    pub multipart_chunksize: u64,

    /// Maximum buffered parts per file. Default: 100
    #[serde(default = "default_max_io_queue")]
    pub max_io_queue: usize,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub verbose: bool,

    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub aws_access_key: Option<String>,

    #[serde(default)]
    pub aws_secret_key: Option<String>,

    #[serde(default)]
    pub aws_region_name: Option<String>,

    /// Custom S3-compatible endpoint (MinIO, LocalStack, ...)
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    /// Passes per group before giving up; 0 retries forever. Default: 10
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,

    /// Base delay between passes, doubled each pass. Default: 1000
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Stop the run on the first failed file instead of retrying
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub fail_fast: bool,

    /// Prometheus text file written at the end of a run
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Minimal configuration with every tunable at its default
    pub fn new(source_path: impl Into<PathBuf>, s3_bucket: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            trigger: None,
            s3_bucket: s3_bucket.into(),
            s3_prefix: String::new(),
            num_threads: default_num_threads(),
            multipart_threshold: default_multipart_threshold(),
            max_concurrency: default_max_concurrency(),
            multipart_chunksize: default_multipart_chunksize(),
            max_io_queue: default_max_io_queue(),
            verbose: false,
            log_file: None,
            log_level: default_log_level(),
            aws_access_key: None,
            aws_secret_key: None,
            aws_region_name: None,
            s3_endpoint: None,
            max_passes: default_max_passes(),
            retry_backoff_ms: default_retry_backoff_ms(),
            fail_fast: false,
            metrics_file: None,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "source_path must be set".into(),
            ));
        }

        if self.s3_bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3_bucket must be set".into(),
            ));
        }

        let positive = [
            ("num_threads", self.num_threads as u64),
            ("multipart_threshold", self.multipart_threshold),
            ("max_concurrency", self.max_concurrency as u64),
            ("multipart_chunksize", self.multipart_chunksize),
            ("max_io_queue", self.max_io_queue as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a positive integer",
                    name
                )));
            }
        }

        if let Some(pattern) = self.trigger_pattern() {
            if let Err(e) = crate::scan::trigger_glob(pattern) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid trigger pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}': must be one of debug, info, warning, error",
                self.log_level
            )));
        }

        match (&self.aws_access_key, &self.aws_secret_key) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::ValidationError(
                    "aws_access_key and aws_secret_key must be set together".into(),
                ))
            }
            _ => {}
        }

        if let Some(ref endpoint) = self.s3_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid s3_endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        Ok(())
    }

    /// The trigger glob, treating an empty value as unset
    pub fn trigger_pattern(&self) -> Option<&str> {
        self.trigger
            .as_deref()
            .map(str::trim)
            .filter(|pattern| !pattern.is_empty())
    }

    /// `log_level` normalized to a `tracing` directive
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" | "critical" => "error",
            _ => "info",
        }
    }

    /// Multipart tunables handed to the object store for every file
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            multipart_threshold: self.multipart_threshold,
            max_concurrency: self.max_concurrency,
            multipart_chunksize: self.multipart_chunksize,
            num_download_attempts: TransferConfig::NUM_DOWNLOAD_ATTEMPTS,
            max_io_queue: self.max_io_queue,
        }
    }
}

fn default_num_threads() -> usize {
    10
}

fn default_multipart_threshold() -> u64 {
    8388608 // 8MB
}

fn default_max_concurrency() -> usize {
    20
}

fn default_multipart_chunksize() -> u64 {
    8388608 // 8MB
}

fn default_max_io_queue() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_passes() -> u32 {
    10
}

fn default_retry_backoff_ms() -> u64 {
    1000
}
