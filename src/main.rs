//! s3upload - concurrent directory uploader for S3
//!
//! Uploads every file under `source_path`, holding back files that match the
//! trigger glob until all other files have been uploaded.

use anyhow::Context;
use clap::Parser;
use s3upload::logging::{init_logging, LoggingOptions};
use s3upload::{Config, Uploader};
use std::path::PathBuf;
use tracing::{error, info};

/// Upload files concurrently to S3
#[derive(Parser, Debug)]
#[command(name = "s3upload")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (INI with a [config] section, or YAML)
    config: PathBuf,

    /// Override log_level (debug, info, warning, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Mirror log messages to stdout
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.log_level = level;
        config.validate()?;
    }
    config.verbose |= args.verbose;

    init_logging(&LoggingOptions::from_config(&config))?;

    info!("Starting s3upload v{}", s3upload::VERSION);
    info!("Loaded configuration from {}", args.config.display());

    let uploader = Uploader::new(config).await?;
    if let Err(e) = uploader.run().await {
        error!("Upload failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}
