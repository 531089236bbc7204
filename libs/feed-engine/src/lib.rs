//! Ingestion, bounded storage and live fan-out of transaction records.

pub mod broadcast;
pub mod error;
pub mod ingest;
pub mod read;
pub mod store;

pub use broadcast::{
    spawn_keepalive, Broadcaster, ChannelSink, ConnectionId, ConnectionSink, DeliveryError, Frame,
    PublishReport, Registration, DEFAULT_KEEPALIVE,
};
pub use error::IngestError;
pub use ingest::{normalize, parse_batch, IngestSummary, Ingestor};
pub use read::{merge_by_signature, ReadScope, ReadService};
pub use store::TransactionStore;
