use std::collections::HashMap;
use std::sync::Arc;

use feed_api::{HistorySource, TransactionRecord};

use crate::ingest::normalize;
use crate::store::TransactionStore;

/// Which sources a read consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Locally ingested records only, in store order.
    Recent,
    /// Local records merged with the historical source.
    Merged,
}

/// Deduplicate by signature and sort by timestamp, newest first.
///
/// On a signature conflict the record with the greater timestamp wins;
/// on equal timestamps the local record is kept.
pub fn merge_by_signature(
    local: Vec<TransactionRecord>,
    historical: Vec<TransactionRecord>,
) -> Vec<TransactionRecord> {
    let mut merged: Vec<TransactionRecord> = Vec::with_capacity(local.len() + historical.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for record in local.into_iter().chain(historical) {
        match index.get(&record.signature) {
            Some(&i) => {
                if record.timestamp > merged[i].timestamp {
                    merged[i] = record;
                }
            }
            None => {
                index.insert(record.signature.clone(), merged.len());
                merged.push(record);
            }
        }
    }

    merged.sort_by(|a, b| b.timestamp.total_cmp(&a.timestamp));
    merged
}

/// Read side of the feed.
#[derive(Clone)]
pub struct ReadService {
    store: Arc<TransactionStore>,
    history: Option<Arc<dyn HistorySource>>,
}

impl ReadService {
    pub fn new(store: Arc<TransactionStore>, history: Option<Arc<dyn HistorySource>>) -> Self {
        Self { store, history }
    }

    pub async fn transactions(&self, scope: ReadScope) -> Vec<TransactionRecord> {
        let local = self.store.list().await;
        let history = match (scope, &self.history) {
            (ReadScope::Merged, Some(history)) => history,
            _ => return local,
        };

        let historical = match history.fetch().await {
            Ok(events) => events.iter().map(normalize).collect(),
            Err(e) => {
                tracing::warn!(source = history.name(), error = %e, "historical source failed, serving local records only");
                Vec::new()
            }
        };
        merge_by_signature(local, historical)
    }
}
