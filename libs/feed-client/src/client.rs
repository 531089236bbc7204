use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use feed_api::{TransactionRecord, UpdateMessage, DEFAULT_STORE_CAPACITY};

use crate::backoff::{Backoff, ConnectionState, Reconnector};
use crate::error::ClientError;
use crate::feed::LocalFeed;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `http://host:port` of the feed server.
    pub base_url: String,
    pub backoff: Backoff,
    pub capacity: usize,
    /// Load `/transactions` before subscribing on every (re)connect.
    pub fetch_snapshot: bool,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            backoff: Backoff::default(),
            capacity: DEFAULT_STORE_CAPACITY,
            fetch_snapshot: true,
        }
    }
}

/// What changed in the local feed.
#[derive(Debug)]
pub enum FeedUpdate<'a> {
    /// Contents were replaced by a server snapshot.
    Snapshot,
    /// A pushed batch was applied.
    NewTransactions(&'a [TransactionRecord]),
}

/// Live consumer of the feed server: snapshot over HTTP, then pushes
/// over `/ws`, reconnecting with backoff until cancelled.
pub struct FeedClient {
    config: ClientConfig,
    http: reqwest::Client,
    ws_url: String,
    feed: LocalFeed,
    reconnector: Reconnector,
}

impl FeedClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base = config.base_url.trim_end_matches('/').to_string();
        let ws_base = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else {
            return Err(ClientError::BaseUrl(config.base_url));
        };
        Ok(Self {
            http: reqwest::Client::new(),
            ws_url: format!("{ws_base}/ws"),
            feed: LocalFeed::new(config.capacity),
            reconnector: Reconnector::new(config.backoff),
            config: ClientConfig { base_url: base, ..config },
        })
    }

    pub fn feed(&self) -> &LocalFeed {
        &self.feed
    }

    pub fn state(&self) -> ConnectionState {
        self.reconnector.state()
    }

    /// Run until `shutdown` is cancelled. `on_update` sees the local feed
    /// after every change.
    pub async fn run<F>(&mut self, mut on_update: F, shutdown: CancellationToken)
    where
        F: FnMut(FeedUpdate<'_>, &LocalFeed),
    {
        loop {
            self.reconnector.begin_connect();
            tracing::debug!(url = %self.ws_url, "connecting");

            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                r = self.session(&mut on_update) => r,
            };

            let delay = self.reconnector.disconnected();
            match outcome {
                Ok(()) => tracing::info!("feed connection closed by server"),
                Err(e) => tracing::warn!(error = %e, "feed connection failed"),
            }
            tracing::info!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.reconnector.attempt(),
                "reconnecting"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::debug!("feed client stopped");
    }

    async fn session<F>(&mut self, on_update: &mut F) -> Result<(), ClientError>
    where
        F: FnMut(FeedUpdate<'_>, &LocalFeed),
    {
        if self.config.fetch_snapshot {
            let snapshot = self.fetch_snapshot().await?;
            self.feed.replace(snapshot);
            on_update(FeedUpdate::Snapshot, &self.feed);
        }

        let (mut socket, _) = tokio_tungstenite::connect_async(self.ws_url.as_str()).await?;
        self.reconnector.connected();
        tracing::info!(url = %self.ws_url, "feed connected");

        while let Some(msg) = socket.next().await {
            match msg? {
                Message::Text(text) => self.handle_text(text.as_str(), on_update),
                Message::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    async fn fetch_snapshot(&self) -> Result<Vec<TransactionRecord>, ClientError> {
        let records = self
            .http
            .get(format!("{}/transactions", self.config.base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<TransactionRecord>>()
            .await?;
        tracing::debug!(count = records.len(), "snapshot loaded");
        Ok(records)
    }

    fn handle_text<F>(&mut self, text: &str, on_update: &mut F)
    where
        F: FnMut(FeedUpdate<'_>, &LocalFeed),
    {
        match serde_json::from_str::<UpdateMessage>(text) {
            Ok(UpdateMessage::Connected) => tracing::debug!("handshake received"),
            Ok(UpdateMessage::NewTransactions { transactions }) => {
                self.feed.apply(&transactions);
                on_update(FeedUpdate::NewTransactions(&transactions), &self.feed);
            }
            Err(e) => tracing::warn!(error = %e, "ignoring undecodable update"),
        }
    }
}
