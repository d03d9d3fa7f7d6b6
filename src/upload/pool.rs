//! Bounded worker pool
//!
//! Drains one pass' work list with at most `limit` upload tasks alive at a
//! time. A finished task is replaced by the next queued item until the list
//! is exhausted, then every in-flight task is joined before returning.

use super::{FailureSet, FileItem};
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

/// Worker pool errors
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Concurrency limit must be at least 1")]
    ZeroConcurrency,
}

/// What happened during one pass
#[derive(Debug, Default)]
pub struct PassOutcome {
    /// Tasks launched
    pub started: usize,
    /// Tasks that panicked; their items were pushed to the failure set
    pub panicked: usize,
    /// Items never launched because the pool halted on a failure
    pub unstarted: Vec<FileItem>,
}

/// Bounded worker pool
#[derive(Debug, Clone)]
pub struct WorkerPool {
    limit: usize,
    halt_on_failure: bool,
}

impl WorkerPool {
    /// Create a pool running at most `limit` tasks at once
    pub fn new(limit: usize) -> Result<Self, PoolError> {
        if limit == 0 {
            return Err(PoolError::ZeroConcurrency);
        }

        Ok(Self {
            limit,
            halt_on_failure: false,
        })
    }

    /// Stop launching new tasks once any failure has been recorded
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `upload` for every item in `work`.
    ///
    /// Returns once every launched task has terminated. Upload failures are
    /// expected to be recorded in `failures` by `upload` itself; a task that
    /// panics has its item recorded here instead.
    pub async fn drain<F, Fut>(
        &self,
        work: Vec<FileItem>,
        upload: F,
        failures: &Arc<FailureSet>,
    ) -> PassOutcome
    where
        F: Fn(FileItem) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut queue: VecDeque<FileItem> = work.into();
        let mut tasks: JoinSet<(FileItem, Result<(), Box<dyn Any + Send>>)> = JoinSet::new();
        let mut outcome = PassOutcome::default();

        loop {
            while tasks.len() < self.limit {
                if self.halt_on_failure && !failures.is_empty() {
                    break;
                }
                let Some(item) = queue.pop_front() else {
                    break;
                };

                let fut = AssertUnwindSafe(upload(item.clone())).catch_unwind();
                tasks.spawn(async move { (item, fut.await) });
                outcome.started += 1;
            }

            // Queue exhausted (or halted) and nothing left in flight
            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok((_, Ok(()))) => {}
                Ok((item, Err(panic))) => {
                    outcome.panicked += 1;
                    tracing::error!(
                        "Upload of {} panicked: {}; requeueing",
                        item.source.display(),
                        panic_message(&*panic)
                    );
                    failures.append(item);
                }
                // Tasks are never aborted, so this only fires on runtime shutdown
                Err(e) => tracing::error!("Upload task failed to join: {}", e),
            }
        }

        outcome.unstarted = queue.into();
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
