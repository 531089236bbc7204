/// Failure of a collaborator plugged into the feed (historical source).
///
/// `Clone` so a cached or stubbed result can be handed out repeatedly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Invalid setup; permanent, fail at startup.
    #[error("config: {0}")]
    Config(String),

    /// Network / upstream failure; the read path degrades to local data.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Upstream answered with something that isn't the expected payload.
    #[error("decode: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
