#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed body: {0}")]
    Parse(serde_json::Error),

    #[error("expected a JSON array of events, got {0}")]
    NotAnArray(&'static str),

    #[error("encode update: {0}")]
    Encode(serde_json::Error),
}
