mod http;
mod sse;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;

use feed_api::{TransportKind, UpdateMessage};
use feed_engine::{Broadcaster, Ingestor, ReadService, TransactionStore};

/// Shared handler state. Everything is owned by the server process and
/// handed to handlers by handle; there are no globals.
#[derive(Clone)]
pub struct AppState {
    store: Arc<TransactionStore>,
    broadcaster: Arc<Broadcaster>,
    ingestor: Ingestor,
    reader: ReadService,
    /// Bounded outbound queue per client connection.
    conn_buffer: usize,
    /// Pre-serialized `{"type":"connected"}` handshake.
    connected: Arc<str>,
}

impl AppState {
    pub fn new(
        store: Arc<TransactionStore>,
        broadcaster: Arc<Broadcaster>,
        reader: ReadService,
        conn_buffer: usize,
    ) -> Result<Self, serde_json::Error> {
        let connected: Arc<str> = UpdateMessage::Connected.to_json()?.into();
        Ok(Self {
            ingestor: Ingestor::new(store.clone(), broadcaster.clone()),
            store,
            broadcaster,
            reader,
            conn_buffer,
            connected,
        })
    }
}

/// Build the HTTP surface. Push transports are mounted per `transports`.
pub fn router(state: AppState, transports: &[TransportKind]) -> Router {
    let mut app: Router<AppState> = Router::new()
        .route(
            "/ingest",
            post(http::handle_ingest).fallback(http::method_not_allowed),
        )
        .route(
            "/transactions",
            get(http::handle_transactions).fallback(http::method_not_allowed),
        )
        .route("/api/stats", get(http::handle_stats));

    if transports.contains(&TransportKind::Sse) {
        app = app.route(
            "/updates",
            get(sse::handle_updates).fallback(http::method_not_allowed),
        );
    }
    if transports.contains(&TransportKind::WebSocket) {
        app = app.route("/ws", get(ws::handle_ws));
    }

    app.layer(axum::middleware::from_fn(http::cors))
        .with_state(state)
}

/// HTTP + SSE + WebSocket API сервер.
pub async fn run(
    bind: &str,
    port: u16,
    state: AppState,
    transports: Vec<TransportKind>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(state, &transports);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .map_err(|e| format!("bind api {bind}:{port}: {e}"))?;

    tracing::info!(bind, port, transports = ?transports, "api server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
