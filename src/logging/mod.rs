//! Logging setup
//!
//! Builds the `tracing` subscriber for a run:
//!
//! ```text
//! Registry
//!   ├── Sink layer (log file or stderr, tab-separated lines)
//!   │     └── EnvFilter (RUST_LOG, else the configured level)
//!   └── Mirror layer (stdout, message only; only when verbose)
//!         └── Targets (this crate, INFO and above)
//! ```

use crate::config::Config;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub mod format;

pub use format::{MessageOnly, TabSeparated};

/// SDK crates are chatty at info; keep them at warn unless RUST_LOG says otherwise
const QUIET_DEPENDENCIES: &str =
    "aws_config=warn,aws_smithy_runtime=warn,aws_smithy_runtime_api=warn,aws_sdk_s3=warn,hyper=warn";

/// Logging errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    InitError(#[from] tracing_subscriber::util::TryInitError),
}

/// Where and how much to log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// `tracing` level directive (`info`, `warn`, ...)
    pub level: String,
    /// Append here instead of writing to stderr
    pub log_file: Option<PathBuf>,
    /// Mirror messages to stdout
    pub verbose: bool,
}

impl LoggingOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            level: config.tracing_level().to_string(),
            log_file: config
                .log_file
                .clone()
                .filter(|path| !path.as_os_str().is_empty()),
            verbose: config.verbose,
        }
    }
}

/// Build the subscriber without installing it
pub fn build_subscriber(
    options: &LoggingOptions,
) -> Result<impl Subscriber + Send + Sync, LoggingError> {
    let writer = match options.log_file {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::OpenLogFile {
                    path: path.clone(),
                    source,
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},{}", options.level, QUIET_DEPENDENCIES))
    });

    let sink = tracing_subscriber::fmt::layer()
        .event_format(TabSeparated)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);

    let mirror = options.verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(MessageOnly)
            .with_ansi(false)
            .with_writer(std::io::stdout)
            .with_filter(Targets::new().with_target(env!("CARGO_CRATE_NAME"), Level::INFO))
    });

    Ok(tracing_subscriber::registry().with(sink).with(mirror))
}

/// Install the subscriber globally
pub fn init_logging(options: &LoggingOptions) -> Result<(), LoggingError> {
    build_subscriber(options)?.try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_file_sink_writes_tab_separated_lines() {
        std::env::remove_var("RUST_LOG");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.log");
        let options = LoggingOptions {
            level: "info".into(),
            log_file: Some(path.clone()),
            verbose: false,
        };

        let subscriber = build_subscriber(&options).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("hidden");
            tracing::warn!("Failed uploading /data/a.txt; requeueing");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);

        let fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(fields.len(), 3);
        let re = regex_lite::Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}$").unwrap();
        assert!(re.is_match(fields[0]), "bad timestamp: {}", fields[0]);
        assert_eq!(fields[1], "WARNING");
        assert_eq!(fields[2], "Failed uploading /data/a.txt; requeueing");
    }

    #[test]
    fn test_unwritable_log_file() {
        let options = LoggingOptions {
            level: "info".into(),
            log_file: Some(PathBuf::from("/definitely/not/here/upload.log")),
            verbose: false,
        };
        assert!(matches!(
            build_subscriber(&options),
            Err(LoggingError::OpenLogFile { .. })
        ));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::new("/data", "bucket");
        config.log_level = "warning".into();
        config.log_file = Some(PathBuf::new());
        config.verbose = true;

        let options = LoggingOptions::from_config(&config);
        assert_eq!(options.level, "warn");
        assert_eq!(options.log_file, None);
        assert!(options.verbose);
    }
}
