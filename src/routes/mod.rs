//! Router assembly: admin endpoints plus HTTP tracing.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::daily::DailyService;

pub mod http;

/// Build the admin router with:
/// - `GET  /api/v1/health`
/// - `GET  /api/v1/streams/:name` bookkeeping snapshot of one stream
/// - `POST /api/v1/streams/:name/publish` publish today's daily right now,
///   only with a matching `x-admin-token` header
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(service: Arc<DailyService>, admin_token: String) -> Router {
    let guarded = Router::new()
        .route("/api/v1/streams/:name/publish", post(http::http_post_publish))
        .route_layer(middleware::from_fn_with_state(admin_token, http::require_admin_token));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/streams/:name", get(http::http_get_stream))
        .merge(guarded)
        .with_state(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
