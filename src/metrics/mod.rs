//! Metrics module
//!
//! Prometheus counters for a run. Batch runs have no scrape endpoint, so
//! the registry can be dumped to a node-exporter style text file instead.

use crate::upload::Group;
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};
use std::path::Path;

lazy_static! {
    pub static ref FILES_SCANNED: CounterVec = register_counter_vec!(
        "s3upload_files_scanned_total",
        "Files found by the scanner",
        &["group"]
    ).unwrap();

    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "s3upload_uploads_total",
        "Upload attempts by outcome",
        &["group", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "s3upload_upload_bytes_total",
        "Total bytes uploaded"
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "s3upload_upload_duration_seconds",
        "Per-file upload duration in seconds",
        &["group"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    pub static ref PASSES_TOTAL: CounterVec = register_counter_vec!(
        "s3upload_passes_total",
        "Worker pool passes per group",
        &["group"]
    ).unwrap();

    pub static ref REQUEUED_TOTAL: CounterVec = register_counter_vec!(
        "s3upload_requeued_total",
        "Failed files queued for another pass",
        &["group"]
    ).unwrap();
}

/// Record scanner output for a group
pub fn record_scanned(group: Group, count: usize) {
    FILES_SCANNED
        .with_label_values(&[group.as_str()])
        .inc_by(count as f64);
}

/// Record a successful upload
pub fn record_upload_success(group: Group, bytes: u64, duration_secs: f64) {
    UPLOADS_TOTAL
        .with_label_values(&[group.as_str(), "success"])
        .inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
    UPLOAD_DURATION
        .with_label_values(&[group.as_str()])
        .observe(duration_secs);
}

/// Record a failed upload
pub fn record_upload_failure(group: Group) {
    UPLOADS_TOTAL
        .with_label_values(&[group.as_str(), "failure"])
        .inc();
}

/// Record the start of a pass
pub fn record_pass(group: Group) {
    PASSES_TOTAL.with_label_values(&[group.as_str()]).inc();
}

/// Record files carried over to the next pass
pub fn record_requeued(group: Group, count: usize) {
    REQUEUED_TOTAL
        .with_label_values(&[group.as_str()])
        .inc_by(count as f64);
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Write the rendered metrics to `path`, replacing it atomically
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let rendered = render().map_err(|e| std::io::Error::other(e.to_string()))?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, rendered)?;
    std::fs::rename(&tmp, path)
}
