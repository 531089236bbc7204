#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("history source: {0}")]
    History(#[from] feed_api::FeedError),

    #[error("encode handshake: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("api server: {0}")]
    Api(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
