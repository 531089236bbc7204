use std::sync::Arc;

use feed_api::{TransactionRecord, UpstreamEvent};

use crate::broadcast::Broadcaster;
use crate::error::IngestError;
use crate::store::TransactionStore;

/// Flatten an indexer event into a transaction record. The first token
/// transfer supplies amount/from/to; absent values become `0` / `""`.
pub fn normalize(event: &UpstreamEvent) -> TransactionRecord {
    let first = event.token_transfers.as_ref().and_then(|t| t.first());
    TransactionRecord {
        signature: event.signature.clone().unwrap_or_default(),
        timestamp: event.timestamp.unwrap_or_default(),
        amount: first.and_then(|t| t.token_amount).unwrap_or_default(),
        kind: event.kind.clone().unwrap_or_default(),
        from: first.and_then(|t| t.from_user_account.clone()).unwrap_or_default(),
        to: first.and_then(|t| t.to_user_account.clone()).unwrap_or_default(),
    }
}

/// Decode a webhook body. Anything but a JSON array of event objects
/// rejects the whole batch.
pub fn parse_batch(body: &[u8]) -> Result<Vec<UpstreamEvent>, IngestError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(IngestError::Parse)?;
    let found = match &value {
        serde_json::Value::Array(_) => None,
        serde_json::Value::Null => Some("null"),
        serde_json::Value::Bool(_) => Some("a boolean"),
        serde_json::Value::Number(_) => Some("a number"),
        serde_json::Value::String(_) => Some("a string"),
        serde_json::Value::Object(_) => Some("an object"),
    };
    if let Some(found) = found {
        return Err(IngestError::NotAnArray(found));
    }
    serde_json::from_value(value).map_err(IngestError::Parse)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub processed_count: usize,
    pub total_stored: usize,
}

/// Webhook side of the feed: normalize → store → one publish per batch.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<TransactionStore>,
    broadcaster: Arc<Broadcaster>,
}

impl Ingestor {
    pub fn new(store: Arc<TransactionStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Store the batch and publish it while the store is still locked,
    /// so concurrent webhooks reach clients in store order.
    pub async fn ingest(&self, events: &[UpstreamEvent]) -> Result<IngestSummary, IngestError> {
        let records: Vec<TransactionRecord> = events.iter().map(normalize).collect();
        let (total_stored, published) = self
            .store
            .append_batch_with(&records, |len| {
                let report = (!records.is_empty()).then(|| self.broadcaster.publish(&records));
                (len, report)
            })
            .await;

        if let Some(report) = published {
            let report = report.map_err(IngestError::Encode)?;
            tracing::debug!(
                records = records.len(),
                delivered = report.delivered,
                dropped = report.dropped,
                removed = report.removed,
                "published batch"
            );
        }

        Ok(IngestSummary {
            processed_count: records.len(),
            total_stored,
        })
    }

    /// Parse and ingest a raw webhook body. A malformed body leaves the
    /// store untouched.
    pub async fn ingest_body(&self, body: &[u8]) -> Result<IngestSummary, IngestError> {
        let events = parse_batch(body)?;
        self.ingest(&events).await
    }
}
