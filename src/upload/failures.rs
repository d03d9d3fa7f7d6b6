//! Failure collector
//!
//! Upload tasks append failed items here concurrently; the sequencer drains
//! it once the pass has been joined and uses the contents as the next
//! pass' work list.

use super::FileItem;
use parking_lot::Mutex;

/// Items that failed during the current pass
#[derive(Debug, Default)]
pub struct FailureSet {
    items: Mutex<Vec<FileItem>>,
}

impl FailureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed item
    pub fn append(&self, item: FileItem) {
        self.items.lock().push(item);
    }

    /// Take every recorded item, leaving the set empty
    pub fn drain_all(&self) -> Vec<FileItem> {
        std::mem::take(&mut *self.items.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_drain_all_empties() {
        let failures = FailureSet::new();
        failures.append(FileItem::new("/data/a.txt", "bucket", "a.txt"));
        assert_eq!(failures.len(), 1);

        let drained = failures.drain_all();
        assert_eq!(drained, vec![FileItem::new("/data/a.txt", "bucket", "a.txt")]);
        assert!(failures.is_empty());
        assert!(failures.drain_all().is_empty());
    }

    #[test]
    fn test_concurrent_append() {
        let failures = Arc::new(FailureSet::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let failures = failures.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        failures.append(FileItem::new(
                            format!("/data/{}-{}", t, i),
                            "bucket",
                            format!("{}-{}", t, i),
                        ));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = failures.drain_all();
        drained.sort_by(|a, b| a.target.cmp(&b.target));
        drained.dedup();
        assert_eq!(drained.len(), 800);
    }
}
