//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws?userId=`
/// - REST-ish API under `/api/v1/...` (identity from the `x-user-id` header)
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/models", get(http::http_get_models))
        .route("/api/v1/assignments", get(http::http_list_assignments))
        .route(
            "/api/v1/assignment",
            get(http::http_get_assignment)
                .post(http::http_post_assignment)
                .delete(http::http_delete_assignment),
        )
        .route(
            "/api/v1/problem",
            get(http::http_get_problem)
                .post(http::http_post_problem)
                .delete(http::http_delete_problem),
        )
        .route("/api/v1/session", post(http::http_post_session))
        .route("/api/v1/chat/reply", post(http::http_post_chat_reply))
        .route(
            "/api/v1/chat",
            get(http::http_get_chat)
                .post(http::http_post_chat)
                .delete(http::http_delete_chat),
        )
        .route("/api/v1/chats", get(http::http_list_chats))
        .route("/api/v1/vote", get(http::http_get_votes).post(http::http_post_vote))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
