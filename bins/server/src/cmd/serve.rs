use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;
use feed_api::HistorySource;
use feed_api_server::AppState;
use feed_engine::{spawn_keepalive, Broadcaster, ReadService, TransactionStore};
use history_helius::HeliusHistory;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("feed-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Store + broadcaster (owned here, shared by handle) ---
    let store = Arc::new(TransactionStore::new(config.store_capacity));
    let broadcaster = Arc::new(Broadcaster::new(config.conn_overflow));
    tracing::info!(
        capacity = config.store_capacity,
        overflow = ?config.conn_overflow,
        "created transaction store"
    );

    // --- Optional historical source ---
    let history: Option<Arc<dyn HistorySource>> = match &config.history {
        Some(h) => {
            let source = HeliusHistory::new(h)?;
            tracing::info!(address = %h.address, base_url = %h.base_url, "historical source enabled");
            Some(Arc::new(source))
        }
        None => {
            tracing::info!("no historical source configured, serving ingested records only");
            None
        }
    };
    let reader = ReadService::new(store.clone(), history);

    // --- Keep-alive ---
    let keepalive = spawn_keepalive(
        broadcaster.clone(),
        Duration::from_secs(config.keepalive_secs),
        token.clone(),
    );

    // --- API server (HTTP + SSE + WS) ---
    let state = AppState::new(store, broadcaster.clone(), reader, config.conn_buffer)?;
    let api_token = token.clone();
    let bind = config.bind.clone();
    let port = config.api_port;
    let transports = config.transports.clone();
    let mut api_handle = tokio::spawn(async move {
        feed_api_server::run(&bind, port, state, transports, api_token).await
    });

    tracing::info!("server ready");

    // --- Ожидание Ctrl+C (или падения API сервера) ---
    let api_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
            None
        }
        res = &mut api_handle => Some(res),
    };

    token.cancel();

    let api_result = match api_result {
        Some(res) => res,
        // Graceful shutdown waits for open streams; don't hang on them.
        None => match tokio::time::timeout(Duration::from_secs(5), &mut api_handle).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(connections = broadcaster.connection_count(), "api server drain timed out, aborting");
                api_handle.abort();
                Ok(Ok(()))
            }
        },
    };

    let _ = keepalive.await;

    match api_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ServerError::Api(e)),
        Err(e) => return Err(ServerError::Api(format!("api task: {e}"))),
    }

    tracing::info!("shutdown complete");
    Ok(())
}
