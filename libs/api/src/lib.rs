//! Shared data model of the transaction feed: records, upstream
//! payloads, push messages and the historical-source seam.

pub mod error;
pub mod history;
pub mod message;
pub mod types;

pub use error::FeedError;
pub use history::HistorySource;
pub use message::UpdateMessage;
pub use types::{
    OverflowPolicy, Timestamp, TokenTransfer, TransactionRecord, TransportKind, UpstreamEvent,
};

/// Server-side bound on buffered records; clients cap their local
/// buffer to the same value.
pub const DEFAULT_STORE_CAPACITY: usize = 50;
