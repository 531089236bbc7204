//! Consumer side of the transaction feed.

pub mod backoff;
pub mod client;
pub mod error;
pub mod feed;

pub use backoff::{Backoff, ConnectionState, Reconnector};
pub use client::{ClientConfig, FeedClient, FeedUpdate};
pub use error::ClientError;
pub use feed::LocalFeed;
