use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;

use feed_api::TransportKind;
use feed_engine::Frame;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  WebSocket: /ws
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(socket, state))
}

/// Push-only socket: published payloads go out as text frames,
/// keep-alives as pings. Client text is ignored.
async fn ws_connection(mut socket: WebSocket, state: AppState) {
    let (registration, mut rx) = state
        .broadcaster
        .attach(TransportKind::WebSocket, state.conn_buffer);
    let id = registration.id();

    if socket
        .send(Message::Text(state.connected.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            biased;

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(connection = id, error = %e, "websocket read error");
                        break;
                    }
                    Some(Ok(Message::Text(t))) => {
                        tracing::trace!(connection = id, len = t.as_str().len(), "ignoring client text");
                    }
                    Some(Ok(_)) => continue,
                }
            }

            frame = rx.recv() => {
                let msg = match frame {
                    Some(Frame::Message(json)) => Message::Text(json.to_string().into()),
                    Some(Frame::KeepAlive) => Message::Ping(Bytes::new()),
                    // Removed by the broadcaster.
                    None => break,
                };
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(registration);
    tracing::debug!(connection = id, "websocket closed");
}
