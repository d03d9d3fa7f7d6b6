//! Group sequencer
//!
//! Drives each group to completion before starting the next one. A group
//! is re-driven with its failed items, pass after pass, until a pass ends
//! with no failures or the retry policy gives up.

use super::{FailureSet, FileItem, Group, UploadTask, WorkerPool};
use crate::config::Config;
use crate::metrics;
use crate::s3::{ObjectStore, TransferConfig};
use crate::scan::FileGroups;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Upper bound on the delay between two passes
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Sequencer errors
#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("{group} group still has {} failed file(s) after {passes} passes", remaining.len())]
    GroupExhausted {
        group: Group,
        passes: u32,
        remaining: Vec<FileItem>,
    },

    #[error("{group} group stopped on first failure: {} file(s) not uploaded", remaining.len())]
    FailFast {
        group: Group,
        /// Failed items followed by the ones never started
        remaining: Vec<FileItem>,
    },
}

/// When to give up on a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Passes per group; 0 keeps retrying forever
    pub max_passes: u32,
    /// Delay before the second pass, doubled for each later one
    pub backoff: Duration,
    /// Give up on the first pass that records a failure
    pub fail_fast: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_passes: config.max_passes,
            backoff: Duration::from_millis(config.retry_backoff_ms),
            fail_fast: config.fail_fast,
        }
    }

    /// Retry forever without waiting
    pub fn unbounded() -> Self {
        Self {
            max_passes: 0,
            backoff: Duration::ZERO,
            fail_fast: false,
        }
    }

    /// Delay before pass number `pass` (1-based)
    pub fn delay_before(&self, pass: u32) -> Duration {
        if pass <= 1 {
            return Duration::ZERO;
        }
        let exponent = (pass - 2).min(16);
        self.backoff.saturating_mul(1 << exponent).min(MAX_BACKOFF)
    }

    fn exhausted(&self, passes: u32) -> bool {
        self.max_passes > 0 && passes >= self.max_passes
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_passes: 10,
            backoff: Duration::from_secs(1),
            fail_fast: false,
        }
    }
}

/// Per-group accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub group: Group,
    /// Files in the group at scan time
    pub files: usize,
    pub passes: u32,
    /// Re-queued uploads summed over every pass
    pub retried: usize,
}

/// Group sequencer
pub struct Sequencer {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    pool: WorkerPool,
    policy: RetryPolicy,
}

impl Sequencer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transfer: TransferConfig,
        pool: WorkerPool,
        policy: RetryPolicy,
    ) -> Self {
        let pool = pool.halt_on_failure(policy.fail_fast);
        Self {
            store,
            transfer,
            pool,
            policy,
        }
    }

    /// Process every group in ascending order.
    ///
    /// A group only starts once the previous one has fully drained; if a
    /// group gives up, later groups are never started.
    pub async fn run(&self, groups: FileGroups) -> Result<Vec<GroupReport>, SequencerError> {
        let mut reports = Vec::new();
        for (group, items) in groups.into_ordered() {
            reports.push(self.run_group(group, items).await?);
        }
        Ok(reports)
    }

    /// Re-drive one group until a pass ends without failures
    pub async fn run_group(
        &self,
        group: Group,
        items: Vec<FileItem>,
    ) -> Result<GroupReport, SequencerError> {
        let mut report = GroupReport {
            group,
            files: items.len(),
            passes: 0,
            retried: 0,
        };

        if items.is_empty() {
            debug!("No files in {} group", group);
            return Ok(report);
        }

        info!("Uploading {} file(s) in {} group", items.len(), group);

        let failures = Arc::new(FailureSet::new());
        let mut work = items;

        while !work.is_empty() {
            report.passes += 1;

            let delay = self.policy.delay_before(report.passes);
            if !delay.is_zero() {
                info!(
                    "Waiting {:?} before pass {} of {} group",
                    delay, report.passes, group
                );
                tokio::time::sleep(delay).await;
            }

            failures.drain_all();
            metrics::record_pass(group);

            let task = Arc::new(UploadTask::new(
                self.store.clone(),
                self.transfer,
                failures.clone(),
                group,
            ));
            let outcome = self
                .pool
                .drain(
                    work,
                    move |item| {
                        let task = task.clone();
                        async move {
                            // Failures are already logged and recorded by the task
                            let _ = task.upload(item).await;
                        }
                    },
                    &failures,
                )
                .instrument(info_span!("pass", group = %group, pass = report.passes))
                .await;

            work = failures.drain_all();

            if work.is_empty() {
                debug!(
                    "Pass {} of {} group uploaded {} file(s)",
                    report.passes, group, outcome.started
                );
                continue;
            }

            if self.policy.fail_fast {
                work.extend(outcome.unstarted);
                return Err(SequencerError::FailFast {
                    group,
                    remaining: work,
                });
            }

            report.retried += work.len();
            metrics::record_requeued(group, work.len());
            warn!(
                "{} of {} file(s) failed on pass {} of {} group",
                work.len(),
                outcome.started,
                report.passes,
                group
            );

            if self.policy.exhausted(report.passes) {
                return Err(SequencerError::GroupExhausted {
                    group,
                    passes: report.passes,
                    remaining: work,
                });
            }
        }

        info!(
            "Finished {} group: {} file(s) in {} pass(es)",
            group, report.files, report.passes
        );
        Ok(report)
    }
}
