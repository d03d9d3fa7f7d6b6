//! File transfer on top of [`S3Client`]
//!
//! Files below the multipart threshold go up in a single PutObject. Larger
//! files are split into parts that are read and uploaded concurrently; any
//! part failure aborts the multipart upload.

use super::{ObjectStore, S3Client, TransferConfig, UploadReceipt};
use crate::upload::multipart::{adjust_chunksize, plan_parts, PartRange};
use crate::upload::UploadError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// [`ObjectStore`] backed by S3
#[derive(Debug, Clone)]
pub struct S3Transfer {
    client: S3Client,
}

impl S3Transfer {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    async fn multipart_upload(
        &self,
        source: &Path,
        bucket: &str,
        key: &str,
        file_size: u64,
        config: &TransferConfig,
    ) -> Result<UploadReceipt, UploadError> {
        let chunksize = adjust_chunksize(config.multipart_chunksize, file_size);
        let ranges = plan_parts(file_size, chunksize);
        let part_count = ranges.len();

        let upload_id = self.client.create_multipart_upload(bucket, key).await?;

        let uploaded = stream::iter(ranges)
            .map(|range| {
                let upload_id = upload_id.as_str();
                async move {
                    let body = read_part(source, range).await?;
                    self.client
                        .upload_part(bucket, key, upload_id, range.part_number, body)
                        .await
                        .map_err(UploadError::from)
                }
            })
            .buffer_unordered(config.parts_in_flight())
            .try_collect::<Vec<_>>()
            .await;

        let mut parts = match uploaded {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload(bucket, key, &upload_id)
                    .await
                {
                    tracing::warn!(
                        upload_id = %upload_id,
                        error = %abort_err,
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        parts.sort_by_key(|part| part.part_number());

        let etag = self
            .client
            .complete_multipart_upload(bucket, key, &upload_id, parts)
            .await?;

        Ok(UploadReceipt {
            bytes: file_size,
            parts: part_count,
            etag,
        })
    }
}

/// Read one part's byte range into memory
async fn read_part(source: &Path, range: PartRange) -> Result<Bytes, UploadError> {
    let mut file = tokio::fs::File::open(source).await?;
    file.seek(SeekFrom::Start(range.offset)).await?;

    let mut buf = Vec::with_capacity(range.len as usize);
    file.take(range.len).read_to_end(&mut buf).await?;

    if buf.len() as u64 != range.len {
        return Err(UploadError::MultipartError(format!(
            "{} changed during upload: part {} read {} of {} bytes",
            source.display(),
            range.part_number,
            buf.len(),
            range.len
        )));
    }

    Ok(Bytes::from(buf))
}

#[async_trait]
impl ObjectStore for S3Transfer {
    async fn upload_file(
        &self,
        source: &Path,
        bucket: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<UploadReceipt, UploadError> {
        let file_size = tokio::fs::metadata(source).await?.len();

        if file_size < config.multipart_threshold {
            let etag = self.client.put_object(bucket, key, source, file_size).await?;
            return Ok(UploadReceipt {
                bytes: file_size,
                parts: 0,
                etag,
            });
        }

        self.multipart_upload(source, bucket, key, file_size, config)
            .await
    }
}
