// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP + WebSocket transport for a Rosenbridge node.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::NodeState;

/// Build the axum `Router` with every HTTP/WS route of spec §6's surface.
pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api", get(http::liveness))
        .route("/api/bridges", get(http::list_bridges))
        .route("/api/bridges/ws", get(ws::bridges_ws))
        .route("/api/messages", post(http::post_message))
        .route("/api/internal/message", post(http::post_internal_message))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
