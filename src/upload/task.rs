//! Upload task
//!
//! Transfers one file through the object store. A failure is recorded in
//! the pass' [`FailureSet`] and logged; it never propagates past the task.

use super::{FailureSet, FileItem, Group, UploadError};
use crate::metrics;
use crate::s3::{ObjectStore, TransferConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared context for every upload in one pass
pub struct UploadTask {
    store: Arc<dyn ObjectStore>,
    transfer: TransferConfig,
    failures: Arc<FailureSet>,
    group: Group,
}

impl UploadTask {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        transfer: TransferConfig,
        failures: Arc<FailureSet>,
        group: Group,
    ) -> Self {
        Self {
            store,
            transfer,
            failures,
            group,
        }
    }

    /// Upload one file, recording it for the next pass on failure
    pub async fn upload(&self, item: FileItem) -> Result<(), UploadError> {
        info!(
            "Uploading {} to s3://{}/{}",
            item.source.display(),
            item.bucket,
            item.target
        );

        let start = Instant::now();
        let result = self
            .store
            .upload_file(&item.source, &item.bucket, &item.target, &self.transfer)
            .await;

        match result {
            Ok(receipt) => {
                metrics::record_upload_success(
                    self.group,
                    receipt.bytes,
                    start.elapsed().as_secs_f64(),
                );
                info!("Completed {}", item.source.display());
                Ok(())
            }
            Err(e) => {
                metrics::record_upload_failure(self.group);
                let source = item.source.display().to_string();
                self.failures.append(item);
                warn!("Failed uploading {}; requeueing", source);
                error!("Error processing {} - {}", source, e);
                Err(e)
            }
        }
    }
}
