//! Run orchestration
//!
//! Scans the source tree, uploads the plain group then the trigger group,
//! and exports metrics when the run ends.

use crate::config::Config;
use crate::metrics;
use crate::s3::{ObjectStore, S3Client, S3ClientConfig, S3ClientError, S3Transfer};
use crate::scan::{scan, FileGroups, ScanError};
use crate::upload::{
    GroupReport, Group, PoolError, RetryPolicy, Sequencer, SequencerError, WorkerPool,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

/// Run errors
#[derive(Error, Debug)]
pub enum UploaderError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Client(#[from] S3ClientError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub groups: Vec<GroupReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Files uploaded across every group
    pub fn files(&self) -> usize {
        self.groups.iter().map(|report| report.files).sum()
    }

    /// Uploads that had to be retried
    pub fn retried(&self) -> usize {
        self.groups.iter().map(|report| report.retried).sum()
    }
}

/// Directory uploader
pub struct Uploader {
    config: Config,
    store: Arc<dyn ObjectStore>,
}

impl Uploader {
    /// Build an uploader talking to S3
    pub async fn new(config: Config) -> Result<Self, UploaderError> {
        let client = S3Client::new(S3ClientConfig::from_config(&config)).await?;
        Ok(Self::with_store(config, Arc::new(S3Transfer::new(client))))
    }

    /// Build an uploader on top of any object store
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan the configured source tree
    pub fn scan(&self) -> Result<FileGroups, ScanError> {
        let groups = scan(
            &self.config.source_path,
            &self.config.s3_bucket,
            &self.config.s3_prefix,
            self.config.trigger_pattern(),
        )?;

        metrics::record_scanned(Group::Plain, groups.plain.len());
        metrics::record_scanned(Group::Trigger, groups.trigger.len());
        Ok(groups)
    }

    /// Scan and upload everything
    pub async fn run(&self) -> Result<RunSummary, UploaderError> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("run", run_id = %run_id);

        let result = self.run_inner().instrument(span).await;
        self.export_metrics();
        result
    }

    async fn run_inner(&self) -> Result<RunSummary, UploaderError> {
        let start = Instant::now();
        let groups = self.scan()?;

        info!(
            "Found {} file(s) under {} ({} plain, {} trigger)",
            groups.len(),
            self.config.source_path.display(),
            groups.plain.len(),
            groups.trigger.len()
        );

        let pool = WorkerPool::new(self.config.num_threads)?;
        let sequencer = Sequencer::new(
            self.store.clone(),
            self.config.transfer_config(),
            pool,
            RetryPolicy::from_config(&self.config),
        );

        let reports = sequencer.run(groups).await?;

        let summary = RunSummary {
            groups: reports,
            elapsed: start.elapsed(),
        };
        info!(
            "Uploaded {} file(s) to s3://{}/{} in {:.1}s ({} retried)",
            summary.files(),
            self.config.s3_bucket,
            self.config.s3_prefix,
            summary.elapsed.as_secs_f64(),
            summary.retried()
        );
        Ok(summary)
    }

    fn export_metrics(&self) {
        if let Some(ref path) = self.config.metrics_file {
            if let Err(e) = metrics::write_textfile(path) {
                warn!("Failed to write metrics to {}: {}", path.display(), e);
            }
        }
    }
}
