use std::convert::Infallible;

use axum::extract::State;
use axum::http::header::HeaderName;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;

use feed_api::TransportKind;
use feed_engine::Frame;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  Server-sent events: GET /updates
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_updates(State(state): State<AppState>) -> impl IntoResponse {
    let (registration, mut rx) = state
        .broadcaster
        .attach(TransportKind::Sse, state.conn_buffer);
    let connected = state.connected.clone();

    // The guard lives inside the body stream: when the client goes away
    // hyper drops the stream and the connection is unregistered.
    let stream = async_stream::stream! {
        let registration = registration;
        tracing::debug!(connection = registration.id(), "sse stream open");
        yield Ok::<Event, Infallible>(Event::default().data(&*connected));
        while let Some(frame) = rx.recv().await {
            match frame {
                Frame::Message(json) => yield Ok(Event::default().data(&*json)),
                Frame::KeepAlive => yield Ok(Event::default().comment("keep-alive")),
            }
        }
    };

    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(stream),
    )
}
