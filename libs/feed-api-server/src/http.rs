use axum::body::Bytes;
use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use feed_engine::ReadScope;

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  Webhook: POST /ingest
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    match state.ingestor.ingest_body(&body).await {
        Ok(summary) => {
            tracing::info!(
                processed = summary.processed_count,
                stored = summary.total_stored,
                "webhook processed"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Webhook processed successfully",
                    "processedCount": summary.processed_count,
                    "totalStoredTransactions": summary.total_stored,
                })),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, bytes = body.len(), "webhook rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Internal server error",
                    "error": e.to_string(),
                })),
            )
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /transactions?type=recent&limit=N
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct TransactionsParams {
    #[serde(rename = "type")]
    scope: Option<String>,
    limit: Option<usize>,
}

pub(crate) async fn handle_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionsParams>,
) -> impl IntoResponse {
    let scope = match params.scope.as_deref() {
        Some("recent") => ReadScope::Recent,
        _ => ReadScope::Merged,
    };
    let mut records = state.reader.transactions(scope).await;
    if let Some(limit) = params.limit {
        records.truncate(limit);
    }
    tracing::debug!(count = records.len(), scope = ?scope, "serving transactions");
    Json(records)
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/stats
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "connections": state.broadcaster.connection_count(),
        "storedTransactions": state.store.len().await,
    }))
}

pub(crate) async fn method_not_allowed(method: Method) -> impl IntoResponse {
    tracing::debug!(%method, "method not allowed");
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "message": "Method not allowed" })),
    )
}

// ═══════════════════════════════════════════════════════════════
//  CORS
// ═══════════════════════════════════════════════════════════════

/// Browser dashboards may be served from another origin: answer
/// preflights and tag every response as world-readable.
pub(crate) async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
                (header::ACCESS_CONTROL_MAX_AGE, "86400"),
            ],
        )
            .into_response();
    }

    let mut resp = next.run(req).await;
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    resp
}
