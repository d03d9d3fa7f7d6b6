//! Worker pool tests
//!
//! Drains passes through real upload tasks backed by an in-memory store.

mod common;

use common::FakeStore;
use s3upload::s3::TransferConfig;
use s3upload::upload::{FailureSet, UploadTask, WorkerPool};
use s3upload::{FileItem, Group};
use std::sync::Arc;
use std::time::Duration;

fn items(n: usize) -> Vec<FileItem> {
    (0..n)
        .map(|i| FileItem::new(format!("/data/f{}", i), "bucket", format!("f{}", i)))
        .collect()
}

fn task(store: &Arc<FakeStore>, failures: &Arc<FailureSet>) -> Arc<UploadTask> {
    Arc::new(UploadTask::new(
        store.clone(),
        TransferConfig::default(),
        failures.clone(),
        Group::Plain,
    ))
}

#[tokio::test]
async fn test_limit_two_with_five_items() {
    let store = Arc::new(FakeStore::with_delay(Duration::from_millis(20)));
    let failures = Arc::new(FailureSet::new());
    let pool = WorkerPool::new(2).unwrap();
    let task = task(&store, &failures);

    let outcome = pool
        .drain(
            items(5),
            move |item| {
                let task = task.clone();
                async move {
                    let _ = task.upload(item).await;
                }
            },
            &failures,
        )
        .await;

    assert_eq!(outcome.started, 5);
    assert_eq!(store.uploaded().len(), 5);
    assert_eq!(store.peak_concurrency(), 2);
    assert!(failures.is_empty());
}

#[tokio::test]
async fn test_limit_above_item_count() {
    let store = Arc::new(FakeStore::with_delay(Duration::from_millis(10)));
    let failures = Arc::new(FailureSet::new());
    let pool = WorkerPool::new(64).unwrap();
    let task = task(&store, &failures);

    let outcome = pool
        .drain(
            items(3),
            move |item| {
                let task = task.clone();
                async move {
                    let _ = task.upload(item).await;
                }
            },
            &failures,
        )
        .await;

    assert_eq!(outcome.started, 3);
    assert_eq!(store.uploaded().len(), 3);
}

#[tokio::test]
async fn test_failures_collected_not_propagated() {
    let store = Arc::new(FakeStore::new().fail("f1", 1).fail("f3", 1));
    let failures = Arc::new(FailureSet::new());
    let pool = WorkerPool::new(3).unwrap();
    let task = task(&store, &failures);

    let outcome = pool
        .drain(
            items(4),
            move |item| {
                let task = task.clone();
                async move {
                    let _ = task.upload(item).await;
                }
            },
            &failures,
        )
        .await;

    assert_eq!(outcome.started, 4);
    let mut failed: Vec<String> = failures.drain_all().into_iter().map(|f| f.target).collect();
    failed.sort();
    assert_eq!(failed, vec!["f1", "f3"]);
}

#[tokio::test]
async fn test_halt_on_failure_stops_launching() {
    let store = Arc::new(FakeStore::new().fail("f0", 1));
    let failures = Arc::new(FailureSet::new());
    let pool = WorkerPool::new(1).unwrap().halt_on_failure(true);
    let task = task(&store, &failures);

    let outcome = pool
        .drain(
            items(4),
            move |item| {
                let task = task.clone();
                async move {
                    let _ = task.upload(item).await;
                }
            },
            &failures,
        )
        .await;

    assert_eq!(outcome.started, 1);
    assert_eq!(outcome.unstarted.len(), 3);
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn test_never_exceeds_limit() {
    for limit in 1..=5 {
        for size in [0, 1, limit, limit + 1, 13] {
            let store = Arc::new(FakeStore::with_delay(Duration::from_millis(2)));
            let failures = Arc::new(FailureSet::new());
            let pool = WorkerPool::new(limit).unwrap();
            let task = task(&store, &failures);

            let outcome = pool
                .drain(
                    items(size),
                    move |item| {
                        let task = task.clone();
                        async move {
                            let _ = task.upload(item).await;
                        }
                    },
                    &failures,
                )
                .await;

            assert_eq!(outcome.started, size, "limit {} size {}", limit, size);
            assert_eq!(store.uploaded().len(), size);
            assert!(
                store.peak_concurrency() <= limit,
                "limit {} size {} peaked at {}",
                limit,
                size,
                store.peak_concurrency()
            );
        }
    }
}
