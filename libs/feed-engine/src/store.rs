use std::collections::VecDeque;

use tokio::sync::RwLock;

use feed_api::TransactionRecord;

// ═══════════════════════════════════════════════════════════════
//  TransactionStore
// ═══════════════════════════════════════════════════════════════

/// Bounded in-memory buffer of the most recent transactions,
/// most-recent-first. Records are never mutated; the only way out is
/// falling off the tail.
pub struct TransactionStore {
    records: RwLock<VecDeque<TransactionRecord>>,
    capacity: usize,
}

impl TransactionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(65536) + 1)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend one record, dropping the oldest beyond capacity.
    pub async fn append(&self, record: TransactionRecord) -> usize {
        let mut buf = self.records.write().await;
        buf.push_front(record);
        buf.truncate(self.capacity);
        buf.len()
    }

    /// Prepend a batch in slice order, so the last element ends up
    /// most recent. Readers never observe a partially applied batch.
    pub async fn append_batch(&self, records: &[TransactionRecord]) -> usize {
        self.append_batch_with(records, |len| len).await
    }

    /// Like [`append_batch`](Self::append_batch), then run `then` with the
    /// new length before the write lock is released. Work done in `then`
    /// is ordered exactly like the writes themselves; it must not block
    /// or touch the store.
    pub async fn append_batch_with<R>(
        &self,
        records: &[TransactionRecord],
        then: impl FnOnce(usize) -> R,
    ) -> R {
        let mut buf = self.records.write().await;
        for record in records {
            buf.push_front(record.clone());
        }
        buf.truncate(self.capacity);
        then(buf.len())
    }

    /// Snapshot, most-recent-first.
    pub async fn list(&self) -> Vec<TransactionRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
