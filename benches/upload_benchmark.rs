//! Upload benchmarks

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use s3upload::s3::{ObjectStore, TransferConfig, UploadReceipt};
use s3upload::scan::scan;
use s3upload::upload::{FailureSet, UploadError, UploadTask, WorkerPool};
use s3upload::{FileItem, Group};
use std::path::Path;
use std::sync::Arc;

struct NullStore;

#[async_trait]
impl ObjectStore for NullStore {
    async fn upload_file(
        &self,
        _source: &Path,
        _bucket: &str,
        _key: &str,
        _config: &TransferConfig,
    ) -> Result<UploadReceipt, UploadError> {
        tokio::task::yield_now().await;
        Ok(UploadReceipt {
            bytes: 0,
            parts: 0,
            etag: None,
        })
    }
}

fn benchmark_scan(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..1000 {
        let sub = dir.path().join(format!("d{}", i % 20));
        std::fs::create_dir_all(&sub).unwrap();
        let ext = if i % 10 == 0 { "done" } else { "dat" };
        std::fs::write(sub.join(format!("f{}.{}", i, ext)), b"x").unwrap();
    }

    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_files", |b| {
        b.iter(|| black_box(scan(dir.path(), "bucket", "prefix", Some("*.done")).unwrap()));
    });
    group.finish();
}

fn benchmark_pool_drain(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let items: Vec<FileItem> = (0..500)
        .map(|i| FileItem::new(format!("/data/f{}", i), "bucket", format!("f{}", i)))
        .collect();

    let mut group = c.benchmark_group("pool_drain");
    group.throughput(Throughput::Elements(items.len() as u64));

    for limit in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            b.to_async(&runtime).iter(|| {
                let items = items.clone();
                async move {
                    let failures = Arc::new(FailureSet::new());
                    let task = Arc::new(UploadTask::new(
                        Arc::new(NullStore),
                        TransferConfig::default(),
                        failures.clone(),
                        Group::Plain,
                    ));
                    let pool = WorkerPool::new(limit).unwrap();
                    let outcome = pool
                        .drain(
                            items,
                            move |item| {
                                let task = task.clone();
                                async move {
                                    let _ = task.upload(item).await;
                                }
                            },
                            &failures,
                        )
                        .await;
                    black_box(outcome.started)
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_scan, benchmark_pool_drain);
criterion_main!(benches);
