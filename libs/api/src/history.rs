use std::future::Future;
use std::pin::Pin;

use crate::{FeedError, UpstreamEvent};

/// Secondary historical transaction source (external indexer API).
///
/// Реализации возвращают события в том же формате, что и webhook.
/// Ошибки не фатальны: read path деградирует до локальных данных.
pub trait HistorySource: Send + Sync {
    /// Fetch the recent history for the configured subject address.
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<UpstreamEvent>, FeedError>> + Send + '_>>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
