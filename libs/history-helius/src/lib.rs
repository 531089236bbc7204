use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;

use feed_api::{FeedError, HistorySource, UpstreamEvent};

// ═══════════════════════════════════════════════════════════════
//  HistoryConfig
// ═══════════════════════════════════════════════════════════════

fn default_base_url() -> String {
    "https://api.helius.xyz".into()
}

fn default_timeout_secs() -> u64 {
    10
}

/// `[history]` section of the server config.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to `HELIUS_API_KEY` when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Subject address whose transactions are fetched.
    pub address: String,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// ═══════════════════════════════════════════════════════════════
//  HeliusHistory
// ═══════════════════════════════════════════════════════════════

/// Historical source backed by the indexer's address-history endpoint:
/// `GET {base}/v0/addresses/{address}/transactions?api-key=...`.
pub struct HeliusHistory {
    http: reqwest::Client,
    url: String,
    api_key: String,
    limit: Option<u32>,
}

impl HeliusHistory {
    pub fn new(config: &HistoryConfig) -> Result<Self, FeedError> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var("HELIUS_API_KEY")
                .map_err(|_| FeedError::Config("history: api_key not set and HELIUS_API_KEY missing".into()))?,
        };
        if config.address.is_empty() {
            return Err(FeedError::Config("history: address is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!(
                "{}/v0/addresses/{}/transactions",
                config.base_url.trim_end_matches('/'),
                config.address
            ),
            api_key,
            limit: config.limit,
        })
    }

    async fn get(&self) -> Result<Vec<UpstreamEvent>, FeedError> {
        let mut req = self.http.get(&self.url).query(&[("api-key", self.api_key.as_str())]);
        if let Some(limit) = self.limit {
            req = req.query(&[("limit", limit)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FeedError::Unavailable(format!("history request: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Unavailable(format!("history read: {e}")))?;

        if !status.is_success() {
            return Err(FeedError::Unavailable(format!("history HTTP {status}: {}", body.trim())));
        }

        let events: Vec<UpstreamEvent> = serde_json::from_str(&body)?;
        tracing::debug!(events = events.len(), "fetched history");
        Ok(events)
    }
}

impl HistorySource for HeliusHistory {
    fn fetch(&self) -> Pin<Box<dyn Future<Output = Result<Vec<UpstreamEvent>, FeedError>> + Send + '_>> {
        Box::pin(self.get())
    }

    fn name(&self) -> &str {
        "helius"
    }
}
