//! s3upload Library
//!
//! Uploads a local directory tree to S3 concurrently.
//!
//! # Features
//!
//! - **Bounded Concurrency**: at most `num_threads` files in flight
//! - **Per-File Retry**: failed files are re-queued pass after pass
//! - **Trigger Files**: files matching a glob are uploaded only after
//!   everything else has succeeded
//! - **Multipart**: large files are split into concurrently uploaded parts
//!
//! # Example
//!
//! ```no_run
//! use s3upload::{Config, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("upload.ini")?;
//!     let uploader = Uploader::new(config).await?;
//!     let summary = uploader.run().await?;
//!     println!("uploaded {} files", summary.files());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod s3;
pub mod scan;
pub mod upload;
pub mod uploader;

// Re-export commonly used types
pub use config::Config;
pub use scan::{scan, FileGroups};
pub use upload::{FileItem, Group};
pub use uploader::{RunSummary, Uploader, UploaderError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
