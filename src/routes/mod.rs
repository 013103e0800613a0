// HTTP routes: query endpoints + request-timing middleware

mod http;

use axum::{
    Router, middleware,
    routing::{delete, get},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::MetricsEngine;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) engine: Arc<MetricsEngine>,
}

pub fn app(engine: Arc<MetricsEngine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/", get(|| async { "pulsedash metrics service" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/metrics/json", get(http::metrics_json)) // GET /metrics/json
        .route("/metrics/table_overview", get(http::table_overview)) // GET /metrics/table_overview
        .route("/metrics/reset", delete(http::reset_store)) // DELETE /metrics/reset
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http::track_requests,
        ))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
