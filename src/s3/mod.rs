//! S3 Client module
//!
//! The object-store seam used by upload tasks, plus its `aws-sdk-s3`
//! implementation.
//!
//! # Example
//!
//! ```no_run
//! use s3upload::s3::{ObjectStore, S3Client, S3ClientConfig, S3Transfer, TransferConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = S3Client::new(S3ClientConfig {
//!     region: Some("us-east-1".to_string()),
//!     endpoint: None,
//!     access_key: None,
//!     secret_key: None,
//!     max_attempts: 5,
//! })
//! .await?;
//!
//! let transfer = S3Transfer::new(client);
//! let receipt = transfer
//!     .upload_file(Path::new("/data/a.txt"), "my-bucket", "out/a.txt", &TransferConfig::default())
//!     .await?;
//! println!("uploaded {} bytes", receipt.bytes);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | bucket, key, bytes, etag |
//! | CreateMultipartUpload | `s3.create_multipart_upload` | bucket, key, upload_id |
//! | UploadPart | `s3.upload_part` | bucket, upload_id, part_number, bytes, etag |
//! | CompleteMultipartUpload | `s3.complete_multipart_upload` | bucket, upload_id, parts_count, etag |
//! | AbortMultipartUpload | `s3.abort_multipart_upload` | bucket, upload_id |

use crate::upload::UploadError;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use std::path::Path;
use thiserror::Error;

mod transfer;

pub use transfer::S3Transfer;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

/// Multipart tunables for a single file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Files at or above this size are uploaded in parts
    pub multipart_threshold: u64,
    /// Part uploads in flight per file
    pub max_concurrency: usize,
    /// Requested part size, adjusted to S3 limits
    pub multipart_chunksize: u64,
    /// Attempts per request before the SDK gives up.
    ///
    /// Retries live in the SDK client, so this is applied once when the
    /// client is built (see [`S3ClientConfig::from_config`]). Transfers only
    /// carry it along and do not read it per call.
    pub num_download_attempts: u32,
    /// Parts buffered in memory per file
    pub max_io_queue: usize,
}

impl TransferConfig {
    /// Fixed request attempt count handed to the SDK retry layer
    pub const NUM_DOWNLOAD_ATTEMPTS: u32 = 5;

    /// Number of parts that may be read and uploading at the same time
    pub fn parts_in_flight(&self) -> usize {
        self.max_concurrency.min(self.max_io_queue).max(1)
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            multipart_threshold: 8 * 1024 * 1024,
            max_concurrency: 20,
            multipart_chunksize: 8 * 1024 * 1024,
            num_download_attempts: Self::NUM_DOWNLOAD_ATTEMPTS,
            max_io_queue: 100,
        }
    }
}

/// What a successful transfer reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub bytes: u64,
    /// 0 for a single PutObject
    pub parts: usize,
    pub etag: Option<String>,
}

/// Object store used by upload tasks.
///
/// Implementations own chunking and per-request retries; callers only see
/// whether the whole file made it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_file(
        &self,
        source: &Path,
        bucket: &str,
        key: &str,
        config: &TransferConfig,
    ) -> Result<UploadReceipt, UploadError>;
}

/// S3 Client configuration
#[derive(Debug, Clone, Default)]
pub struct S3ClientConfig {
    /// Falls back to the SDK region chain when unset
    pub region: Option<String>,
    pub endpoint: Option<String>,
    /// Falls back to the SDK credential chain when unset
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub max_attempts: u32,
}

impl S3ClientConfig {
    /// Build from the uploader configuration
    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            region: config.aws_region_name.clone(),
            endpoint: config.s3_endpoint.clone(),
            access_key: config.aws_access_key.clone(),
            secret_key: config.aws_secret_key.clone(),
            max_attempts: config.transfer_config().num_download_attempts,
        }
    }
}

/// S3 Client
///
/// Thin wrapper around the AWS SDK client exposing the calls a transfer
/// needs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct S3Client {
    client: aws_sdk_s3::Client,
}

impl S3Client {
    /// Create a new S3 client
    pub async fn new(config: S3ClientConfig) -> Result<Self, S3ClientError> {
        if config.max_attempts == 0 {
            return Err(S3ClientError::ConfigError(
                "max_attempts must be at least 1".into(),
            ));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).retry_config(
            aws_config::retry::RetryConfig::standard().with_max_attempts(config.max_attempts),
        );

        if let Some(ref region) = config.region {
            loader = loader.region(Region::new(region.clone()));
        }

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                let credentials = aws_credential_types::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "s3upload-config",
                );
                loader = loader.credentials_provider(credentials);
            }
            (None, None) => {}
            _ => {
                return Err(S3ClientError::ConfigError(
                    "access_key and secret_key must be set together".into(),
                ))
            }
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(ref endpoint) = config.endpoint {
            // S3-compatible services generally need path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        })
    }

    /// Upload a whole file in one request (PutObject)
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, source),
        fields(s3.bucket = %bucket, s3.key = %key, upload.bytes = len, s3.etag = tracing::field::Empty),
        err
    )]
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        len: u64,
    ) -> Result<Option<String>, S3ClientError> {
        let body = ByteStream::from_path(source)
            .await
            .map_err(|e| S3ClientError::RequestError(e.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(len as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }
        Ok(etag)
    }

    /// Create a multipart upload
    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self),
        fields(s3.bucket = %bucket, s3.key = %key, s3.upload_id = tracing::field::Empty),
        err
    )]
    pub async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, S3ClientError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let upload_id = output.upload_id().map(str::to_string).ok_or_else(|| {
            S3ClientError::ResponseError("CreateMultipartUpload returned no upload id".into())
        })?;

        tracing::Span::current().record("s3.upload_id", upload_id.as_str());
        Ok(upload_id)
    }

    /// Upload a part in a multipart upload
    #[tracing::instrument(
        name = "s3.upload_part",
        skip(self, body),
        fields(
            s3.bucket = %bucket,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> Result<CompletedPart, S3ClientError> {
        let len = body.len() as i64;
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(len)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().map(str::to_string).ok_or_else(|| {
            S3ClientError::ResponseError(format!("UploadPart {} returned no ETag", part_number))
        })?;
        tracing::Span::current().record("s3.etag", etag.as_str());

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .e_tag(etag)
            .build())
    }

    /// Complete a multipart upload
    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, parts),
        fields(
            s3.bucket = %bucket,
            s3.upload_id = %upload_id,
            parts_count = parts.len(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<Option<String>, S3ClientError> {
        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;

        let etag = output.e_tag().map(str::to_string);
        if let Some(ref etag) = etag {
            tracing::Span::current().record("s3.etag", etag.as_str());
        }
        Ok(etag)
    }

    /// Abort a multipart upload so its parts stop accruing storage
    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self),
        fields(s3.bucket = %bucket, s3.upload_id = %upload_id),
        err
    )]
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ClientError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
