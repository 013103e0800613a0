// Query handlers + the timing middleware feeding the store

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::time::Instant;

use super::AppState;
use crate::engine::EngineError;
use crate::store::unix_now;
use crate::version::{NAME, VERSION};

/// Times every request (error responses included) and records it into the
/// store. Recording never fails the request path.
pub(super) async fn track_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let path = request.uri().path().to_owned();
    let method = request.method().as_str().to_owned();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    state
        .engine
        .record_request_metrics(&path, duration, response.status().as_u16(), &method)
        .await;

    response
}

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct RangeQuery {
    ts_from: i64,
    /// Defaults to the current time when omitted.
    ts_to: Option<i64>,
}

/// GET /metrics/json — the full aggregated payload for a time window.
pub(super) async fn metrics_json(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, Response> {
    let ts_to = range.ts_to.unwrap_or_else(unix_now);
    let payload = state
        .engine
        .get_metrics(range.ts_from, ts_to)
        .await
        .map_err(into_error_response)?;
    Ok(axum::Json(payload))
}

/// GET /metrics/table_overview — per-route table for a time window.
pub(super) async fn table_overview(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> Result<impl IntoResponse, Response> {
    let ts_to = range.ts_to.unwrap_or_else(unix_now);
    let table = state
        .engine
        .get_table_overview(range.ts_from, ts_to)
        .await
        .map_err(into_error_response)?;
    Ok(axum::Json(table))
}

/// DELETE /metrics/reset — clears the store (test isolation, operator resets).
pub(super) async fn reset_store(State(state): State<AppState>) -> Result<StatusCode, Response> {
    state.engine.reset().await.map_err(into_error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

fn into_error_response(e: EngineError) -> Response {
    tracing::warn!(error = %e, "metrics query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}
