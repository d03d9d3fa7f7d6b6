//! Upload module
//!
//! Orchestrates a directory upload: the worker pool that drains one pass,
//! the per-file upload task, the shared failure collector, and the
//! sequencer that re-drives each group until it is empty.

use crate::s3::S3ClientError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod failures;
pub mod multipart;
pub mod pool;
pub mod sequencer;
pub mod task;

pub use failures::FailureSet;
pub use pool::{PassOutcome, PoolError, WorkerPool};
pub use sequencer::{GroupReport, RetryPolicy, Sequencer, SequencerError};
pub use task::UploadTask;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("S3 error: {0}")]
    S3Error(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Multipart upload error: {0}")]
    MultipartError(String),

    #[error("Upload task panicked: {0}")]
    Panicked(String),
}

impl From<S3ClientError> for UploadError {
    fn from(err: S3ClientError) -> Self {
        UploadError::S3Error(err.to_string())
    }
}

/// One file to upload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileItem {
    pub source: PathBuf,
    pub bucket: String,
    pub target: String,
}

impl FileItem {
    pub fn new(source: impl Into<PathBuf>, bucket: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            bucket: bucket.into(),
            target: target.into(),
        }
    }
}

/// File partitions, processed strictly in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    /// Everything not matching the trigger glob
    Plain = 1,
    /// Files held back until every plain file has been uploaded
    Trigger = 2,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Plain => "plain",
            Group::Trigger => "trigger",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
