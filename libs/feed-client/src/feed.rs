use std::collections::VecDeque;

use feed_api::{TransactionRecord, DEFAULT_STORE_CAPACITY};

/// Client-side mirror of the server buffer: most-recent-first,
/// deduplicated by signature, capped like the server store.
#[derive(Debug, Clone)]
pub struct LocalFeed {
    records: VecDeque<TransactionRecord>,
    capacity: usize,
}

impl Default for LocalFeed {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_CAPACITY)
    }
}

impl LocalFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Apply a pushed batch (oldest first); a re-delivered signature
    /// moves to the front with the newer copy.
    pub fn apply(&mut self, batch: &[TransactionRecord]) {
        for record in batch {
            self.records.retain(|r| r.signature != record.signature);
            self.records.push_front(record.clone());
        }
        self.records.truncate(self.capacity);
    }

    /// Replace contents with a server snapshot (already most-recent-first).
    pub fn replace(&mut self, snapshot: Vec<TransactionRecord>) {
        self.records.clear();
        for record in snapshot {
            if self.records.len() == self.capacity {
                break;
            }
            if !self.records.iter().any(|r| r.signature == record.signature) {
                self.records.push_back(record);
            }
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
