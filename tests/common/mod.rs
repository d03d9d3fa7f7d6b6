//! Shared test doubles

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use s3upload::s3::{ObjectStore, TransferConfig, UploadReceipt};
use s3upload::upload::UploadError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory object store that records every attempt.
///
/// Keys registered with [`FakeStore::fail`] fail that many times before
/// succeeding; `usize::MAX` fails forever.
#[derive(Default)]
pub struct FakeStore {
    attempts: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<String>>,
    failing: Mutex<HashMap<String, usize>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail(self, key: &str, times: usize) -> Self {
        self.failing.lock().insert(key.to_string(), times);
        self
    }

    /// Keys in the order their uploads succeeded
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().clone()
    }

    /// Keys in the order uploads were attempted
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn attempts_for(&self, key: &str) -> usize {
        self.attempts.lock().iter().filter(|k| *k == key).count()
    }

    /// Highest number of uploads seen running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn upload_file(
        &self,
        _source: &Path,
        _bucket: &str,
        key: &str,
        _config: &TransferConfig,
    ) -> Result<UploadReceipt, UploadError> {
        self.attempts.lock().push(key.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let should_fail = {
            let mut failing = self.failing.lock();
            match failing.get_mut(key) {
                Some(remaining) if *remaining > 0 => {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    true
                }
                _ => false,
            }
        };

        if should_fail {
            return Err(UploadError::S3Error(format!("injected failure for {}", key)));
        }

        self.uploaded.lock().push(key.to_string());
        Ok(UploadReceipt {
            bytes: 0,
            parts: 0,
            etag: None,
        })
    }
}

/// Write `content` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
