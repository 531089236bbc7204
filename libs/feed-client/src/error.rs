#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("snapshot request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid base url '{0}'")]
    BaseUrl(String),
}
